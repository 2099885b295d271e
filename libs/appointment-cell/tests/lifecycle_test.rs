mod common;

use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use appointment_cell::{
    AppointmentBookingService, AppointmentError, AppointmentQueryService, AppointmentStatus,
    AppointmentStore,
};
use notification_queue_cell::AppointmentEventKind;

use common::*;

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

#[tokio::test]
async fn cancel_on_completed_appointment_is_rejected_and_state_unchanged() {
    let clinic = clinic().await;
    let completed = seed_appointment(
        &clinic.store,
        clinic.doctor_id,
        at(next_monday(), 10, 0),
        30,
        AppointmentStatus::Completed,
    )
    .await;

    let service = AppointmentBookingService::new(clinic.context.clone());
    let result = service.cancel_appointment(completed.id, Some("Changed plans".to_string())).await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Cancelled,
        })
    );
    let stored = clinic.store.get(completed.id).await.unwrap().unwrap();
    assert_eq!(stored, completed);
}

#[tokio::test]
async fn cancel_appends_reason_and_emits_event() {
    let mut clinic = clinic().await;
    let booked = seed_appointment(
        &clinic.store,
        clinic.doctor_id,
        at(next_monday(), 11, 0),
        30,
        AppointmentStatus::Scheduled,
    )
    .await;

    let service = AppointmentBookingService::new(clinic.context.clone());
    let cancelled = assert_ok!(service.cancel_appointment(booked.id, Some("Feeling better".to_string())).await);

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.notes.as_deref(), Some("Cancelled: Feeling better"));

    let event = tokio::time::timeout(StdDuration::from_secs(1), clinic.events.recv())
        .await
        .expect("no event published")
        .unwrap();
    assert_eq!(event.kind, AppointmentEventKind::AppointmentCancelled);
    assert_eq!(event.appointment_id, booked.id);
}

#[tokio::test]
async fn full_visit_records_actual_times() {
    let clinic = clinic().await;
    let booked = seed_appointment(
        &clinic.store,
        clinic.doctor_id,
        at(next_monday(), 9, 0),
        30,
        AppointmentStatus::Scheduled,
    )
    .await;
    let service = AppointmentBookingService::new(clinic.context.clone());

    assert_ok!(service.transition_status(booked.id, AppointmentStatus::Confirmed, None).await);
    let started = assert_ok!(service.transition_status(booked.id, AppointmentStatus::InProgress, None).await);
    assert!(started.actual_start.is_some());

    let completed = assert_ok!(
        service
            .transition_status(booked.id, AppointmentStatus::Completed, Some("Prescribed rest".to_string()))
            .await
    );
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert!(completed.actual_end.is_some());
    assert_eq!(completed.notes.as_deref(), Some("Prescribed rest"));
}

#[tokio::test]
async fn no_show_is_refused_before_the_start_time() {
    let clinic = clinic().await;
    let future = seed_appointment(
        &clinic.store,
        clinic.doctor_id,
        at(next_monday(), 14, 0),
        30,
        AppointmentStatus::Confirmed,
    )
    .await;
    let service = AppointmentBookingService::new(clinic.context.clone());

    let result = service.transition_status(future.id, AppointmentStatus::NoShow, None).await;
    assert_matches!(result, Err(AppointmentError::InvalidStatusTransition { .. }));
}

#[tokio::test]
async fn no_show_is_allowed_once_the_start_has_passed() {
    let clinic = clinic().await;
    let past = seed_appointment(
        &clinic.store,
        clinic.doctor_id,
        Utc::now() - Duration::hours(2),
        30,
        AppointmentStatus::Scheduled,
    )
    .await;
    let service = AppointmentBookingService::new(clinic.context.clone());

    let marked = assert_ok!(service.transition_status(past.id, AppointmentStatus::NoShow, None).await);
    assert_eq!(marked.status, AppointmentStatus::NoShow);
}

#[tokio::test]
async fn transition_of_unknown_appointment_is_not_found() {
    let clinic = clinic().await;
    let service = AppointmentBookingService::new(clinic.context.clone());

    let result = service.transition_status(Uuid::new_v4(), AppointmentStatus::Confirmed, None).await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

// ==============================================================================
// RESCHEDULE
// ==============================================================================

#[tokio::test]
async fn reschedule_can_overlap_its_own_previous_window() {
    let clinic = clinic().await;
    let monday = next_monday();
    let booked = seed_appointment(&clinic.store, clinic.doctor_id, at(monday, 10, 0), 45, AppointmentStatus::Scheduled).await;
    let service = AppointmentBookingService::new(clinic.context.clone());

    let moved = assert_ok!(service.reschedule_appointment(booked.id, at(monday, 10, 15)).await);

    assert_eq!(moved.scheduled_start, at(monday, 10, 15));
    assert_eq!(moved.scheduled_end, at(monday, 11, 0));
    assert_eq!(moved.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn reschedule_into_another_booking_is_unavailable() {
    let clinic = clinic().await;
    let monday = next_monday();
    let first = seed_appointment(&clinic.store, clinic.doctor_id, at(monday, 10, 0), 30, AppointmentStatus::Scheduled).await;
    seed_appointment(&clinic.store, clinic.doctor_id, at(monday, 11, 0), 30, AppointmentStatus::Confirmed).await;
    let service = AppointmentBookingService::new(clinic.context.clone());

    let result = service.reschedule_appointment(first.id, at(monday, 10, 45)).await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
    let stored = clinic.store.get(first.id).await.unwrap().unwrap();
    assert_eq!(stored.scheduled_start, at(monday, 10, 0));
}

#[tokio::test]
async fn reschedule_of_cancelled_appointment_is_rejected() {
    let clinic = clinic().await;
    let monday = next_monday();
    let cancelled = seed_appointment(&clinic.store, clinic.doctor_id, at(monday, 10, 0), 30, AppointmentStatus::Cancelled).await;
    let service = AppointmentBookingService::new(clinic.context.clone());

    let result = service.reschedule_appointment(cancelled.id, at(monday, 12, 0)).await;
    assert_err!(result);
}

// ==============================================================================
// READ MODELS
// ==============================================================================

#[tokio::test]
async fn doctor_schedule_lists_every_day_in_range() {
    let clinic = clinic().await;
    let monday = next_monday();
    seed_appointment(&clinic.store, clinic.doctor_id, at(monday, 9, 0), 30, AppointmentStatus::Scheduled).await;
    seed_appointment(&clinic.store, clinic.doctor_id, at(monday, 15, 0), 30, AppointmentStatus::Cancelled).await;
    let wednesday = monday + Duration::days(2);
    seed_appointment(&clinic.store, clinic.doctor_id, at(wednesday, 11, 0), 30, AppointmentStatus::Confirmed).await;

    let queries = AppointmentQueryService::new(clinic.context.clone());
    let schedule = assert_ok!(queries.doctor_schedule(clinic.doctor_id, monday, monday + Duration::days(4)).await);

    assert_eq!(schedule.days.len(), 5);
    assert_eq!(schedule.days[0].date, monday);
    assert_eq!(schedule.days[0].appointments.len(), 2);
    assert!(schedule.days[1].appointments.is_empty());
    assert_eq!(schedule.days[2].appointments.len(), 1);
}

#[tokio::test]
async fn doctor_schedule_rejects_bad_ranges() {
    let clinic = clinic().await;
    let monday = next_monday();
    let queries = AppointmentQueryService::new(clinic.context.clone());

    let inverted = queries.doctor_schedule(clinic.doctor_id, monday, monday - Duration::days(1)).await;
    let too_long = queries.doctor_schedule(clinic.doctor_id, monday, monday + Duration::days(31)).await;
    let unknown = queries.doctor_schedule(Uuid::new_v4(), monday, monday).await;

    assert_matches!(inverted, Err(AppointmentError::Validation(_)));
    assert_matches!(too_long, Err(AppointmentError::Validation(_)));
    assert_matches!(unknown, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn upcoming_returns_only_active_future_appointments_in_order() {
    let clinic = clinic().await;
    let now = Utc::now();
    let later = seed_appointment(&clinic.store, clinic.doctor_id, now + Duration::days(3), 30, AppointmentStatus::Scheduled).await;
    let sooner = seed_appointment(&clinic.store, clinic.doctor_id, now + Duration::hours(5), 30, AppointmentStatus::Confirmed).await;
    seed_appointment(&clinic.store, clinic.doctor_id, now + Duration::days(1), 30, AppointmentStatus::Cancelled).await;
    seed_appointment(&clinic.store, clinic.doctor_id, now + Duration::days(20), 30, AppointmentStatus::Scheduled).await;
    seed_appointment(&clinic.store, clinic.doctor_id, now - Duration::days(1), 30, AppointmentStatus::Scheduled).await;

    let queries = AppointmentQueryService::new(clinic.context.clone());
    let upcoming = assert_ok!(queries.upcoming(Some(7)).await);

    let ids: Vec<Uuid> = upcoming.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![sooner.id, later.id]);

    assert_matches!(queries.upcoming(Some(0)).await, Err(AppointmentError::Validation(_)));
    assert_matches!(queries.upcoming(Some(31)).await, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn get_appointment_by_id() {
    let clinic = clinic().await;
    let booked = seed_appointment(&clinic.store, clinic.doctor_id, at(next_monday(), 9, 0), 30, AppointmentStatus::Scheduled).await;
    let queries = AppointmentQueryService::new(clinic.context.clone());

    assert_eq!(queries.get_appointment(booked.id).await.unwrap(), booked);
    assert_matches!(queries.get_appointment(Uuid::new_v4()).await, Err(AppointmentError::NotFound));
}
