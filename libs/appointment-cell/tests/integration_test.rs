use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::{
    appointment_routes, Appointment, AppointmentBookings, AppointmentError, AppointmentNotifier, AppointmentPriority,
    AppointmentQuery, AppointmentService, AppointmentStatus, CalendarQuery, CancelAppointmentRequest,
    CompleteAppointmentRequest, CreateAppointmentRequest, NoShowSweep, ReminderSweep, RescheduleAppointmentRequest,
};
use auth_cell::{Account, AccountService, RegisterRequest};
use doctor_cell::{
    CreateDoctorRequest, CreateTimeSlotRequest, Doctor, DoctorError, DoctorService, DoctorTables, TimeSlot,
};
use notification_cell::{
    InMemoryQueue, MemoryMailer, PeriodicTask, QueueStats, TaskProducer, TaskQueue, TaskWorker, WorkerConfig,
};
use patient_cell::{
    BloodGroup, CreatePatientRequest, EmergencyContact, Gender, Patient, PatientError, PatientService,
};
use shared_database::Table;
use shared_models::auth::{Role, User};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

const ALL_DAYS: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

struct Fixture {
    service: Arc<AppointmentService>,
    doctors: Arc<DoctorService>,
    patients: Arc<PatientService>,
    accounts: Arc<AccountService>,
    appointments: Arc<Table<Appointment>>,
    queue: Arc<InMemoryQueue>,
    worker: TaskWorker,
    mailer: MemoryMailer,
    admin: User,
}

fn fixture() -> Fixture {
    let config = TestConfig::default().to_arc();
    let accounts = Arc::new(AccountService::new(config.clone(), Arc::new(Account::table())));
    let appointments = Arc::new(Appointment::table());
    let bookings = Arc::new(AppointmentBookings::new(appointments.clone()));
    let doctors = Arc::new(DoctorService::new(
        config.clone(),
        accounts.clone(),
        DoctorTables::in_memory(),
        bookings.clone(),
    ));
    let patients = Arc::new(PatientService::new(
        config.clone(),
        accounts.clone(),
        Arc::new(Patient::table()),
        bookings,
    ));

    let queue = Arc::new(InMemoryQueue::new());
    let service = Arc::new(AppointmentService::new(
        config,
        appointments.clone(),
        doctors.clone(),
        patients.clone(),
        accounts.clone(),
        TaskProducer::new(queue.clone()),
    ));

    let mailer = MemoryMailer::new();
    let notifier = AppointmentNotifier::new(service.clone(), Arc::new(mailer.clone())).unwrap();
    let worker = TaskWorker::new(WorkerConfig::default(), queue.clone(), Arc::new(notifier));

    Fixture {
        service,
        doctors,
        patients,
        accounts,
        appointments,
        queue,
        worker,
        mailer,
        admin: TestUser::admin("admin@example.com").to_user(),
    }
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn in_days(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

fn as_user(account: &Account) -> User {
    TestUser::with_id(account.id, &account.email, account.role).to_user()
}

async fn account(fx: &Fixture, email: &str, first: &str, role: Role) -> Account {
    fx.accounts
        .create(
            RegisterRequest {
                email: email.to_string(),
                password: "long-enough".to_string(),
                first_name: first.to_string(),
                last_name: "Tester".to_string(),
                phone: None,
                address: None,
                date_of_birth: None,
            },
            role,
        )
        .await
        .unwrap()
}

async fn doctor(fx: &Fixture, email: &str, days: &[&str], max: Option<u32>) -> (Doctor, Account) {
    let account = account(fx, email, "Gregory", Role::Doctor).await;
    let doctor = fx
        .doctors
        .create(CreateDoctorRequest {
            user_id: account.id,
            specialization_ids: vec![],
            license_number: format!("LIC-{}", email),
            qualification: "MD".to_string(),
            experience_years: 10,
            consultation_fee: 100.0,
            available_days: days.iter().map(|d| d.to_string()).collect(),
            available_time_start: time(9, 0),
            available_time_end: time(17, 0),
            max_appointments_per_day: max,
            is_available: None,
        })
        .await
        .unwrap();
    (doctor, account)
}

async fn slot(fx: &Fixture, doctor: &Doctor, hour: u32) -> TimeSlot {
    fx.doctors
        .create_slot(
            &fx.admin,
            CreateTimeSlotRequest {
                doctor_id: doctor.id,
                start_time: time(hour, 0),
                end_time: time(hour, 30),
            },
        )
        .await
        .unwrap()
}

async fn patient(fx: &Fixture, email: &str) -> (Patient, Account) {
    let account = account(fx, email, "Ada", Role::Patient).await;
    let patient = fx
        .patients
        .create(
            &fx.admin,
            CreatePatientRequest {
                user_id: Some(account.id),
                blood_group: BloodGroup::APositive,
                gender: Gender::Female,
                emergency_contact: EmergencyContact {
                    name: "Charles".to_string(),
                    phone: "555-0101".to_string(),
                    relationship: "Friend".to_string(),
                },
                allergies: String::new(),
                medical_conditions: String::new(),
                current_medications: String::new(),
                insurance_provider: String::new(),
                insurance_id: String::new(),
            },
        )
        .await
        .unwrap();
    (patient, account)
}

fn booking(patient: &Patient, doctor: &Doctor, slot: &TimeSlot, date: NaiveDate) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: Some(patient.id),
        doctor_id: doctor.id,
        appointment_date: date,
        time_slot_id: slot.id,
        reason: "Annual checkup".to_string(),
        symptoms: String::new(),
        priority: AppointmentPriority::Normal,
    }
}

fn stored(patient: &Patient, doctor: &Doctor, slot: &TimeSlot, date: NaiveDate, status: AppointmentStatus) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: doctor.id,
        appointment_date: date,
        time_slot_id: slot.id,
        status,
        priority: AppointmentPriority::Normal,
        reason: "Follow-up".to_string(),
        symptoms: String::new(),
        notes: String::new(),
        prescription: String::new(),
        follow_up_date: None,
        cancelled_by: None,
        cancellation_reason: String::new(),
        created_at: now,
        updated_at: now,
    }
}

async fn slot_available(fx: &Fixture, slot: &TimeSlot) -> bool {
    fx.doctors.get_slot(slot.id).await.unwrap().is_available
}

async fn stats(fx: &Fixture) -> QueueStats {
    fx.worker.stats().await.unwrap()
}

#[tokio::test]
async fn test_booking_claims_slot_and_queues_confirmation() {
    let fx = fixture();
    let (doc, doc_account) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, pat_account) = patient(&fx, "ada@example.com").await;

    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(3))).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert!(!slot_available(&fx, &s).await);
    assert_eq!(fx.queue.pending().await.unwrap(), 1);

    assert_eq!(fx.worker.drain().await.unwrap(), 1);
    let to_patient = fx.mailer.sent_to(&pat_account.email).await;
    let to_doctor = fx.mailer.sent_to(&doc_account.email).await;
    assert_eq!(to_patient[0].subject, "Appointment Confirmation");
    assert_eq!(to_doctor[0].subject, "New Appointment Scheduled");
    assert!(to_patient[0].text_body.contains("Annual checkup"));
}

#[tokio::test]
async fn test_double_booking_fails() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let (other, _) = patient(&fx, "bob@example.com").await;

    fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(3))).await.unwrap();
    let err = fx.service.create(&fx.admin, booking(&other, &doc, &s, in_days(3))).await.unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "time_slot", .. });
}

#[tokio::test]
async fn test_unique_constraint_catches_races() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;

    let date = in_days(2);
    fx.appointments
        .insert(stored(&pat, &doc, &s, date, AppointmentStatus::Scheduled))
        .await
        .unwrap();
    let err: AppointmentError = fx
        .appointments
        .insert(stored(&pat, &doc, &s, date, AppointmentStatus::Confirmed))
        .await
        .unwrap_err()
        .into();
    assert_matches!(err, AppointmentError::SlotTaken);

    // A cancelled row does not hold the slot.
    fx.appointments
        .insert(stored(&pat, &doc, &s, date, AppointmentStatus::Cancelled))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_past_date_names_appointment_date() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;

    let err = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(-1))).await.unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "appointment_date", .. });
    assert!(slot_available(&fx, &s).await);
}

#[tokio::test]
async fn test_weekday_outside_schedule_is_rejected() {
    let fx = fixture();
    let date = in_days(7);
    let other_day = date.weekday().succ().to_string();
    let (doc, _) = doctor(&fx, "house@example.com", &[other_day.as_str()], None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;

    let err = fx.service.create(&fx.admin, booking(&pat, &doc, &s, date)).await.unwrap_err();
    match err {
        AppointmentError::Invalid { field, message } => {
            assert_eq!(field, "appointment_date");
            assert!(message.contains("not available on"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_daily_cap_rejects_second_slot() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, Some(1)).await;
    let first = slot(&fx, &doc, 9).await;
    let second = slot(&fx, &doc, 10).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;

    let date = in_days(4);
    fx.service.create(&fx.admin, booking(&pat, &doc, &first, date)).await.unwrap();
    let err = fx.service.create(&fx.admin, booking(&pat, &doc, &second, date)).await.unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "doctor", .. });
    assert!(slot_available(&fx, &second).await);
}

#[tokio::test]
async fn test_slot_of_another_doctor_names_time_slot() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let (other, _) = doctor(&fx, "wilson@example.com", &ALL_DAYS, None).await;
    let foreign = slot(&fx, &other, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;

    let err = fx.service.create(&fx.admin, booking(&pat, &doc, &foreign, in_days(2))).await.unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "time_slot", .. });
}

#[tokio::test]
async fn test_patient_books_only_for_themselves() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (ada, ada_account) = patient(&fx, "ada@example.com").await;
    let (bob, _) = patient(&fx, "bob@example.com").await;
    let ada_user = as_user(&ada_account);

    let err = fx.service.create(&ada_user, booking(&bob, &doc, &s, in_days(2))).await.unwrap_err();
    assert_matches!(err, AppointmentError::Forbidden(_));

    let mut own = booking(&ada, &doc, &s, in_days(2));
    own.patient_id = None;
    let appointment = fx.service.create(&ada_user, own).await.unwrap();
    assert_eq!(appointment.patient_id, ada.id);
}

#[tokio::test]
async fn test_cancel_frees_slot_and_notifies_both_parties() {
    let fx = fixture();
    let (doc, doc_account) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, pat_account) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(3))).await.unwrap();
    fx.worker.drain().await.unwrap();

    let err = fx
        .service
        .cancel(&as_user(&pat_account), appointment.id, CancelAppointmentRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "cancellation_reason", .. });

    let cancelled = fx
        .service
        .cancel(
            &as_user(&pat_account),
            appointment.id,
            CancelAppointmentRequest {
                cancellation_reason: "Feeling better".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(pat_account.id));
    assert!(slot_available(&fx, &s).await);

    fx.worker.drain().await.unwrap();
    let mail = fx.mailer.sent_to(&doc_account.email).await;
    let last = mail.last().unwrap();
    assert_eq!(last.subject, "Appointment Cancelled");
    assert!(last.text_body.contains("Feeling better"));
    assert!(last.text_body.contains("Ada Tester"));
    assert_eq!(fx.mailer.sent_to(&pat_account.email).await.len(), 2);
}

#[tokio::test]
async fn test_cancelling_completed_appointment_fails() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(1))).await.unwrap();

    fx.service.confirm(&fx.admin, appointment.id).await.unwrap();
    fx.service
        .complete(&fx.admin, appointment.id, CompleteAppointmentRequest::default())
        .await
        .unwrap();

    let err = fx
        .service
        .cancel(
            &fx.admin,
            appointment.id,
            CancelAppointmentRequest {
                cancellation_reason: "Too late".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "status", .. });
    assert_eq!(fx.service.get(appointment.id).await.unwrap().status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn test_completing_scheduled_appointment_fails() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(1))).await.unwrap();

    let err = fx
        .service
        .complete(&fx.admin, appointment.id, CompleteAppointmentRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "status", .. });
}

#[tokio::test]
async fn test_complete_only_overwrites_with_non_empty_values() {
    let fx = fixture();
    let (doc, doc_account) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(1))).await.unwrap();
    let doctor_user = as_user(&doc_account);

    fx.service.confirm(&doctor_user, appointment.id).await.unwrap();
    fx.service.start(&doctor_user, appointment.id).await.unwrap();
    let completed = fx
        .service
        .complete(
            &doctor_user,
            appointment.id,
            CompleteAppointmentRequest {
                notes: Some("  ".to_string()),
                prescription: Some("Rest".to_string()),
                follow_up_date: Some(in_days(30)),
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert_eq!(completed.notes, "");
    assert_eq!(completed.prescription, "Rest");
    assert_eq!(completed.follow_up_date, Some(in_days(30)));
}

#[tokio::test]
async fn test_reschedule_moves_the_slot_flags() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let old = slot(&fx, &doc, 9).await;
    let new = slot(&fx, &doc, 11).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &old, in_days(2))).await.unwrap();

    let moved = fx
        .service
        .reschedule(
            &fx.admin,
            appointment.id,
            RescheduleAppointmentRequest {
                new_date: Some(in_days(5)),
                new_time_slot: Some(new.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.appointment_date, in_days(5));
    assert_eq!(moved.time_slot_id, new.id);
    assert!(slot_available(&fx, &old).await);
    assert!(!slot_available(&fx, &new).await);
}

#[tokio::test]
async fn test_rescheduling_cancelled_appointment_leaves_slots_alone() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let old = slot(&fx, &doc, 9).await;
    let new = slot(&fx, &doc, 11).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &old, in_days(2))).await.unwrap();
    fx.service
        .cancel(
            &fx.admin,
            appointment.id,
            CancelAppointmentRequest {
                cancellation_reason: "Clinic closed".to_string(),
            },
        )
        .await
        .unwrap();

    let err = fx
        .service
        .reschedule(
            &fx.admin,
            appointment.id,
            RescheduleAppointmentRequest {
                new_date: Some(in_days(5)),
                new_time_slot: Some(new.id),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "status", .. });
    assert!(slot_available(&fx, &old).await);
    assert!(slot_available(&fx, &new).await);
}

#[tokio::test]
async fn test_no_show_can_be_rescheduled() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let old = slot(&fx, &doc, 9).await;
    let new = slot(&fx, &doc, 11).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let missed = fx
        .appointments
        .insert(stored(&pat, &doc, &old, in_days(-1), AppointmentStatus::NoShow))
        .await
        .unwrap();
    fx.doctors.set_slot_availability(old.id, false).await.unwrap();

    let moved = fx
        .service
        .reschedule(
            &fx.admin,
            missed.id,
            RescheduleAppointmentRequest {
                new_date: Some(in_days(4)),
                new_time_slot: Some(new.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.status, AppointmentStatus::NoShow);
    assert_eq!(moved.appointment_date, in_days(4));
    assert!(slot_available(&fx, &old).await);
    assert!(!slot_available(&fx, &new).await);
}

#[tokio::test]
async fn test_no_show_can_be_cancelled() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let missed = fx
        .appointments
        .insert(stored(&pat, &doc, &s, in_days(-1), AppointmentStatus::NoShow))
        .await
        .unwrap();
    fx.doctors.set_slot_availability(s.id, false).await.unwrap();

    let cancelled = fx
        .service
        .cancel(
            &fx.admin,
            missed.id,
            CancelAppointmentRequest {
                cancellation_reason: "Patient moved away".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert!(slot_available(&fx, &s).await);

    let again = fx
        .service
        .cancel(
            &fx.admin,
            missed.id,
            CancelAppointmentRequest {
                cancellation_reason: "Twice".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(again, AppointmentError::Invalid { field: "status", .. });
}

#[tokio::test]
async fn test_reschedule_requires_both_fields() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(2))).await.unwrap();

    let err = fx
        .service
        .reschedule(
            &fx.admin,
            appointment.id,
            RescheduleAppointmentRequest {
                new_date: Some(in_days(3)),
                new_time_slot: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "new_time_slot", .. });
}

#[tokio::test]
async fn test_admin_delete_frees_slot() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(2))).await.unwrap();

    fx.service.delete(appointment.id).await.unwrap();
    assert!(slot_available(&fx, &s).await);
}

#[tokio::test]
async fn test_profiles_with_appointments_cannot_be_deleted() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let (other, _) = patient(&fx, "bob@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(2))).await.unwrap();
    let kept = fx
        .service
        .create(&fx.admin, booking(&other, &doc, &slot(&fx, &doc, 10).await, in_days(3)))
        .await
        .unwrap();

    assert_matches!(fx.patients.delete(pat.id).await, Err(PatientError::HasAppointments(_)));
    assert_matches!(fx.doctors.delete(doc.id).await, Err(DoctorError::SlotInUse(_)));

    fx.service
        .cancel(
            &fx.admin,
            appointment.id,
            CancelAppointmentRequest {
                cancellation_reason: "Travelling".to_string(),
            },
        )
        .await
        .unwrap();
    fx.service.delete(kept.id).await.unwrap();

    // Cancelled history still references both profiles.
    assert_matches!(fx.doctors.delete(doc.id).await, Err(DoctorError::HasAppointments(_)));
    assert_matches!(fx.patients.delete(pat.id).await, Err(PatientError::HasAppointments(_)));
    fx.patients.delete(other.id).await.unwrap();

    let listed = fx.service.list(&fx.admin, &AppointmentQuery::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].appointment.id, appointment.id);
    assert!(slot_available(&fx, &s).await);

    fx.service.delete(appointment.id).await.unwrap();
    fx.patients.delete(pat.id).await.unwrap();
    fx.doctors.delete(doc.id).await.unwrap();
    assert!(fx.service.list(&fx.admin, &AppointmentQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_is_role_filtered() {
    let fx = fixture();
    let (house, house_account) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let (wilson, _) = doctor(&fx, "wilson@example.com", &ALL_DAYS, None).await;
    let a = slot(&fx, &house, 9).await;
    let b = slot(&fx, &wilson, 9).await;
    let (ada, ada_account) = patient(&fx, "ada@example.com").await;
    let (bob, _) = patient(&fx, "bob@example.com").await;

    fx.service.create(&fx.admin, booking(&ada, &house, &a, in_days(2))).await.unwrap();
    fx.service.create(&fx.admin, booking(&bob, &wilson, &b, in_days(2))).await.unwrap();

    let query = AppointmentQuery::default();
    assert_eq!(fx.service.list(&fx.admin, &query).await.unwrap().len(), 2);
    assert_eq!(fx.service.list(&as_user(&house_account), &query).await.unwrap().len(), 1);

    let mine = fx.service.list(&as_user(&ada_account), &query).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].appointment.patient_id, ada.id);

    let stranger = TestUser::patient("nobody@example.com").to_user();
    assert!(fx.service.list(&stranger, &query).await.unwrap().is_empty());

    let err = fx
        .service
        .list(
            &fx.admin,
            &AppointmentQuery {
                ordering: Some("-reason".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "ordering", .. });
}

#[tokio::test]
async fn test_other_patients_cannot_read_appointment() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (ada, _) = patient(&fx, "ada@example.com").await;
    let (_, bob_account) = patient(&fx, "bob@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&ada, &doc, &s, in_days(2))).await.unwrap();

    let err = fx.service.get_for(&as_user(&bob_account), appointment.id).await.unwrap_err();
    assert_matches!(err, AppointmentError::Forbidden(_));
}

#[tokio::test]
async fn test_no_show_sweep_only_touches_past_pending() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s1 = slot(&fx, &doc, 9).await;
    let s2 = slot(&fx, &doc, 10).await;
    let s3 = slot(&fx, &doc, 11).await;
    let (pat, pat_account) = patient(&fx, "ada@example.com").await;

    let missed = fx
        .appointments
        .insert(stored(&pat, &doc, &s1, in_days(-2), AppointmentStatus::Confirmed))
        .await
        .unwrap();
    let done = fx
        .appointments
        .insert(stored(&pat, &doc, &s2, in_days(-2), AppointmentStatus::Completed))
        .await
        .unwrap();
    let today = fx
        .appointments
        .insert(stored(&pat, &doc, &s3, in_days(0), AppointmentStatus::Scheduled))
        .await
        .unwrap();

    let sweep = NoShowSweep::new(fx.service.clone());
    assert_eq!(sweep.run(Utc::now()).await.unwrap(), 1);

    assert_eq!(fx.service.get(missed.id).await.unwrap().status, AppointmentStatus::NoShow);
    assert_eq!(fx.service.get(done.id).await.unwrap().status, AppointmentStatus::Completed);
    assert_eq!(fx.service.get(today.id).await.unwrap().status, AppointmentStatus::Scheduled);

    fx.worker.drain().await.unwrap();
    let mail = fx.mailer.sent_to(&pat_account.email).await;
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].subject, "Missed Appointment Notification");
}

#[tokio::test]
async fn test_reminder_sweep_mails_both_parties() {
    let fx = fixture();
    let (doc, doc_account) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let tomorrow_slot = slot(&fx, &doc, 9).await;
    let later_slot = slot(&fx, &doc, 10).await;
    let (pat, pat_account) = patient(&fx, "ada@example.com").await;

    fx.appointments
        .insert(stored(&pat, &doc, &tomorrow_slot, in_days(1), AppointmentStatus::Scheduled))
        .await
        .unwrap();
    fx.appointments
        .insert(stored(&pat, &doc, &later_slot, in_days(3), AppointmentStatus::Confirmed))
        .await
        .unwrap();

    let sweep = ReminderSweep::new(fx.service.clone());
    assert_eq!(sweep.run(Utc::now()).await.unwrap(), 1);
    fx.worker.drain().await.unwrap();

    let to_patient = fx.mailer.sent_to(&pat_account.email).await;
    let to_doctor = fx.mailer.sent_to(&doc_account.email).await;
    assert_eq!(to_patient.len(), 1);
    assert_eq!(to_doctor.len(), 1);
    assert_eq!(to_doctor[0].subject, "Appointment Reminder");
    assert!(to_doctor[0].text_body.contains("Dear Gregory Tester"));
    assert!(to_patient[0].text_body.contains("09:00"));
}

#[tokio::test]
async fn test_task_for_deleted_appointment_is_skipped() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let appointment = fx.service.create(&fx.admin, booking(&pat, &doc, &s, in_days(2))).await.unwrap();

    fx.service.delete(appointment.id).await.unwrap();
    fx.worker.drain().await.unwrap();

    let stats = stats(&fx).await;
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.completed, 0);
    assert!(fx.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_available_slots_validates_parameters() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let free = slot(&fx, &doc, 9).await;
    let taken = slot(&fx, &doc, 10).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    fx.service.create(&fx.admin, booking(&pat, &doc, &taken, in_days(2))).await.unwrap();

    let slots = fx
        .service
        .available_slots(&appointment_cell::AvailableSlotsQuery {
            doctor: Some(doc.id.to_string()),
            date: Some(in_days(2).to_string()),
        })
        .await
        .unwrap();
    assert_eq!(slots.iter().map(|s| s.id).collect::<Vec<_>>(), vec![free.id]);

    let err = fx
        .service
        .available_slots(&appointment_cell::AvailableSlotsQuery {
            doctor: Some(doc.id.to_string()),
            date: Some("02/03/2030".to_string()),
        })
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "date", .. });
}

#[tokio::test]
async fn test_calendar_and_export() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 14).await;
    let (pat, _) = patient(&fx, "ada@example.com").await;
    let mut request = booking(&pat, &doc, &s, in_days(2));
    request.reason = "Cough, fever".to_string();
    fx.service.create(&fx.admin, request).await.unwrap();

    let events = fx.service.calendar(&fx.admin, &Default::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].start, in_days(2).and_time(time(14, 0)));
    assert_eq!(events[0].doctor_name, "Gregory Tester");

    let err = fx
        .service
        .calendar(
            &fx.admin,
            &CalendarQuery {
                from: Some(NaiveDate::MAX),
                to: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Invalid { field: "from", .. });

    let csv = fx.service.export_csv(&fx.admin, &AppointmentQuery::default()).await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("\"Cough, fever\""));
    assert!(lines[1].contains("14:00"));
}

#[tokio::test]
async fn test_routes_require_auth_and_report_conflicts() {
    let fx = fixture();
    let (doc, _) = doctor(&fx, "house@example.com", &ALL_DAYS, None).await;
    let s = slot(&fx, &doc, 9).await;
    let (pat, pat_account) = patient(&fx, "ada@example.com").await;
    let config = fx.service.config().clone();
    let app = appointment_routes(fx.service.clone());

    let anonymous = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let token = JwtTestUtils::bearer(
        &TestUser::with_id(pat_account.id, &pat_account.email, Role::Patient),
        &config.jwt_secret,
    );
    let body = json!({
        "doctor_id": doc.id,
        "appointment_date": in_days(2),
        "time_slot_id": s.id,
        "reason": "Sore throat"
    });

    let created = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", &token)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(created.into_body(), usize::MAX).await.unwrap();
    let view: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(view["patient_id"], json!(pat.id));
    assert_eq!(view["status"], "scheduled");

    let again = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", &token)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(again.into_body(), usize::MAX).await.unwrap();
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["field"], "time_slot");

    let listed = app
        .oneshot(
            Request::builder()
                .uri("/upcoming")
                .header("Authorization", &token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(listed.into_body(), usize::MAX).await.unwrap();
    let listing: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(listing["total"], 1);
}
