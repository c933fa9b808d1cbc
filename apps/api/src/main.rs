use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{Appointment, AppointmentBookings, AppointmentNotifier, AppointmentService, NoShowSweep, ReminderSweep};
use auth_cell::{Account, AccountService};
use content_cell::{Page, PageService};
use doctor_cell::{DoctorService, DoctorTables};
use notification_cell::{
    mailer_from_config, DailySchedule, InMemoryQueue, RedisTaskQueue, Scheduler, TaskProducer, TaskQueue, TaskWorker,
    WorkerConfig,
};
use patient_cell::{Patient, PatientService};
use records_cell::{RecordService, RecordTables};
use shared_config::AppConfig;

use crate::router::AppServices;

async fn task_queue(config: &AppConfig) -> anyhow::Result<Arc<dyn TaskQueue>> {
    match &config.redis_url {
        Some(url) => {
            let queue = RedisTaskQueue::connect(url).await.context("connecting to the Redis task queue")?;
            info!("Using the Redis task queue");
            Ok(Arc::new(queue))
        }
        None => {
            info!("REDIS_URL not set, using the in-process task queue");
            Ok(Arc::new(InMemoryQueue::new()))
        }
    }
}

async fn build_services(config: Arc<AppConfig>) -> anyhow::Result<AppServices> {
    let dir = config.data_dir.as_deref();
    match dir {
        Some(dir) => info!("Persisting tables under {}", dir.display()),
        None => warn!("DATA_DIR not set, all data lives in memory"),
    }

    let accounts = Arc::new(AccountService::new(
        config.clone(),
        Arc::new(Account::table().persisted(dir).await?),
    ));
    let appointments_table = Arc::new(Appointment::table().persisted(dir).await?);
    let bookings = Arc::new(AppointmentBookings::new(appointments_table.clone()));
    let doctors = Arc::new(DoctorService::new(
        config.clone(),
        accounts.clone(),
        DoctorTables::open(dir).await?,
        bookings.clone(),
    ));
    let patients = Arc::new(PatientService::new(
        config.clone(),
        accounts.clone(),
        Arc::new(Patient::table().persisted(dir).await?),
        bookings,
    ));

    let queue = task_queue(&config).await?;
    let appointments = Arc::new(AppointmentService::new(
        config.clone(),
        appointments_table,
        doctors.clone(),
        patients.clone(),
        accounts.clone(),
        TaskProducer::new(queue.clone()),
    ));
    let records = Arc::new(RecordService::new(
        config.clone(),
        RecordTables::open(dir).await?,
        doctors.clone(),
        patients.clone(),
        appointments.clone(),
    ));
    let pages = Arc::new(PageService::new(
        config.clone(),
        Arc::new(Page::table().persisted(dir).await?),
        doctors.clone(),
    )?);

    let notifier = AppointmentNotifier::new(appointments.clone(), mailer_from_config(&config))?;
    let worker = Arc::new(TaskWorker::new(WorkerConfig::default(), queue, Arc::new(notifier)));

    Ok(AppServices {
        accounts,
        doctors,
        patients,
        appointments,
        records,
        pages,
        worker,
    })
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
    }
    info!("Shutting down");
    let _ = shutdown.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hospital API server");

    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        warn!("JWT_SECRET is not set; authenticated routes will reject every token");
    }

    let services = build_services(config.clone()).await?;

    if let Some(admin) = services.accounts.ensure_admin().await? {
        info!("Created bootstrap admin {}", admin.email);
    }
    if services.pages.seed_site().await? {
        info!("Seeded the default website");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = services.worker.clone();
    let worker_shutdown = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let jobs = Scheduler::new()
        .every_day(
            DailySchedule::at(config.reminder_hour, 0),
            Arc::new(ReminderSweep::new(services.appointments.clone())),
        )
        .every_day(
            DailySchedule::at(config.no_show_sweep_hour, 0),
            Arc::new(NoShowSweep::new(services.appointments.clone())),
        )
        .spawn(shutdown_rx.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(&services)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    if let Err(e) = worker_handle.await {
        warn!("Task worker ended abnormally: {}", e);
    }
    for job in jobs {
        if let Err(e) = job.await {
            warn!("Scheduled job ended abnormally: {}", e);
        }
    }

    Ok(())
}
