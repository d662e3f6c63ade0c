use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::Store,
    dtos::appointmentdtos::{
        AppointmentFilterDto, AppointmentListResponseDto, AppointmentQueryDto,
        AppointmentStatsDto, AssignAgentDto, CleanupDto, CleanupResultDto, CreateAppointmentDto,
        DailyAppointmentsDto, FeedbackDto, PaginationDto, RescheduleAppointmentDto,
        UpdateStatusDto, DEFAULT_CLEANUP_DAYS,
    },
    error::{field_violations, ErrorMessage, FieldViolation},
    models::appointmentmodel::{Appointment, AppointmentStatus, NewAppointment, StatusChange},
    service::error::ServiceError,
    utils::schedule::{normalize_time, parse_date, SchedulingClock},
};

const PAST_SLOT_MESSAGE: &str = "Appointment date and time must be in the future";

fn parse_id(value: &str, field: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(value.trim()).map_err(|_| {
        ServiceError::invalid(
            ErrorMessage::InvalidAppointmentData.to_string(),
            vec![FieldViolation::new(field, "Identifier is invalid")],
        )
    })
}

pub fn parse_appointment_id(value: &str) -> Result<Uuid, ServiceError> {
    parse_id(value, "id")
}

fn invalid_data<V: Validate>(dto: &V) -> Result<(), ServiceError> {
    dto.validate().map_err(|e| {
        ServiceError::invalid(
            ErrorMessage::InvalidAppointmentData.to_string(),
            field_violations(&e),
        )
    })
}

/// Books, schedules and closes out viewing appointments.
#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn Store>,
    clock: SchedulingClock,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn Store>, clock: SchedulingClock) -> Self {
        Self { store, clock }
    }

    /// Validates the slot (including the future check) before touching the property.
    pub async fn book(
        &self,
        body: CreateAppointmentDto,
    ) -> Result<AppointmentFilterDto, ServiceError> {
        let mut violations = match body.validate() {
            Ok(()) => Vec::new(),
            Err(e) => field_violations(&e),
        };

        let date = parse_date(&body.appointment_date);
        let time = normalize_time(&body.appointment_time);
        if let (Some(date), Some(time)) = (date, time.as_deref()) {
            if !self.clock.is_strictly_future(date, time, self.clock.now()) {
                violations.push(FieldViolation::new("appointmentDate", PAST_SLOT_MESSAGE));
                violations.sort_by(|a, b| a.field.cmp(&b.field));
            }
        }

        if !violations.is_empty() {
            tracing::warn!("rejected booking: {} invalid field(s)", violations.len());
            return Err(ServiceError::invalid(
                ErrorMessage::InvalidAppointmentData.to_string(),
                violations,
            ));
        }

        let property_id = parse_id(&body.property_id, "propertyId")?;
        let (date, time) = match (date, time) {
            (Some(date), Some(time)) => (date, time),
            _ => {
                return Err(ServiceError::invalid(
                    ErrorMessage::InvalidAppointmentData.to_string(),
                    Vec::new(),
                ))
            }
        };

        let property = self
            .store
            .get_property_summary(property_id)
            .await?
            .ok_or(ServiceError::PropertyNotFound(property_id))?;

        let appointment = self
            .store
            .create_appointment(NewAppointment {
                name: body.name.trim().to_string(),
                email: body.email.trim().to_lowercase(),
                phone: body.phone.trim().to_string(),
                property_id,
                appointment_date: date,
                appointment_time: time,
                appointment_type: body.parsed_type(),
                notes: body.trimmed_notes(),
                assigned_agent: None,
            })
            .await?;

        tracing::info!(
            "appointment {} booked for property {} on {} at {}",
            appointment.id,
            property.id,
            appointment.appointment_date,
            appointment.appointment_time
        );

        Ok(AppointmentFilterDto::filter_appointment(&appointment, Some(&property), None))
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<AppointmentFilterDto, ServiceError> {
        let appointment = self.find(appointment_id).await?;
        self.populate(&appointment).await
    }

    pub async fn list(
        &self,
        query: AppointmentQueryDto,
    ) -> Result<AppointmentListResponseDto, ServiceError> {
        invalid_data(&query)?;
        let filter = query.into_filter();

        let (appointments, total) = self.store.get_appointments(&filter).await?;

        Ok(AppointmentListResponseDto {
            appointments: self.populate_many(&appointments).await?,
            pagination: PaginationDto::new(filter.page, filter.limit, total),
        })
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        body: UpdateStatusDto,
    ) -> Result<AppointmentFilterDto, ServiceError> {
        invalid_data(&body)?;
        let status = body.parsed_status().ok_or_else(|| {
            ServiceError::invalid(
                ErrorMessage::InvalidAppointmentData.to_string(),
                vec![FieldViolation::new("status", "Appointment status is invalid")],
            )
        })?;

        let change = StatusChange::to(status, body.trimmed_reason(), Utc::now());
        let appointment = self
            .store
            .update_appointment_status(appointment_id, change)
            .await?
            .ok_or(ServiceError::AppointmentNotFound(appointment_id))?;

        tracing::info!("appointment {} moved to {:?}", appointment_id, status);

        self.populate(&appointment).await
    }

    /// Promotes a pending appointment to confirmed. The agent's calendar is not re-checked.
    pub async fn assign_agent(
        &self,
        appointment_id: Uuid,
        body: AssignAgentDto,
    ) -> Result<AppointmentFilterDto, ServiceError> {
        invalid_data(&body)?;
        let agent_id = parse_id(&body.assigned_agent, "assignedAgent")?;

        let agent = self
            .store
            .get_user(agent_id)
            .await?
            .ok_or(ServiceError::AgentNotFound(agent_id))?;

        let appointment = self
            .store
            .assign_appointment_agent(appointment_id, agent_id)
            .await?
            .ok_or(ServiceError::AppointmentNotFound(appointment_id))?;

        tracing::info!("agent {} assigned to appointment {}", agent.id, appointment_id);

        let property = self.store.get_property_summary(appointment.property_id).await?;
        Ok(AppointmentFilterDto::filter_appointment(
            &appointment,
            property.as_ref(),
            Some(&agent),
        ))
    }

    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        body: RescheduleAppointmentDto,
    ) -> Result<AppointmentFilterDto, ServiceError> {
        invalid_data(&body)?;
        let (date, time) = match (
            parse_date(&body.appointment_date),
            normalize_time(&body.appointment_time),
        ) {
            (Some(date), Some(time)) => (date, time),
            _ => {
                return Err(ServiceError::invalid(
                    ErrorMessage::InvalidAppointmentData.to_string(),
                    Vec::new(),
                ))
            }
        };

        self.find(appointment_id).await?;

        if !self.clock.is_strictly_future(date, &time, self.clock.now()) {
            return Err(ServiceError::invalid(
                PAST_SLOT_MESSAGE,
                vec![FieldViolation::new("appointmentDate", PAST_SLOT_MESSAGE)],
            ));
        }

        let appointment = self
            .store
            .reschedule_appointment(appointment_id, date, &time)
            .await
            .map_err(ServiceError::from)
            .inspect_err(|e| {
                if let ServiceError::SlotTaken { existing } = e {
                    tracing::warn!(
                        "reschedule of {} to {} {} collides with {}",
                        appointment_id,
                        date,
                        time,
                        existing
                    );
                }
            })?;

        tracing::info!("appointment {} rescheduled to {} {}", appointment_id, date, time);

        self.populate(&appointment).await
    }

    pub async fn submit_feedback(
        &self,
        appointment_id: Uuid,
        body: FeedbackDto,
    ) -> Result<AppointmentFilterDto, ServiceError> {
        invalid_data(&body)?;
        let rating = body
            .rating
            .and_then(|r| i16::try_from(r).ok())
            .ok_or_else(|| {
                ServiceError::invalid(
                    ErrorMessage::InvalidAppointmentData.to_string(),
                    vec![FieldViolation::new("rating", "Rating is required")],
                )
            })?;

        let appointment = self.find(appointment_id).await?;
        if appointment.status != AppointmentStatus::Completed {
            return Err(ServiceError::AppointmentNotCompleted(appointment_id, appointment.status));
        }

        let appointment = self
            .store
            .save_appointment_feedback(appointment_id, rating, body.trimmed_comment(), Utc::now())
            .await?
            .ok_or(ServiceError::AppointmentNotFound(appointment_id))?;

        tracing::info!("feedback {} recorded for appointment {}", rating, appointment_id);

        self.populate(&appointment).await
    }

    pub async fn delete(&self, appointment_id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_appointment(appointment_id).await? {
            return Err(ServiceError::AppointmentNotFound(appointment_id));
        }
        tracing::info!("appointment {} deleted", appointment_id);
        Ok(())
    }

    pub async fn daily(&self, date: &str) -> Result<DailyAppointmentsDto, ServiceError> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
            ServiceError::invalid(
                "Invalid date",
                vec![FieldViolation::new("date", "Date must be formatted as YYYY-MM-DD")],
            )
        })?;

        let appointments = self.store.get_appointments_on(date).await?;
        Ok(DailyAppointmentsDto::new(
            date,
            self.populate_many(&appointments).await?,
        ))
    }

    pub async fn stats(&self) -> Result<AppointmentStatsDto, ServiceError> {
        let today = self.clock.today();
        let week_start = today - Duration::days(7);

        let stats = self.store.get_appointment_stats(today, week_start).await?;
        Ok(stats.into())
    }

    pub async fn cleanup_completed(
        &self,
        body: CleanupDto,
    ) -> Result<CleanupResultDto, ServiceError> {
        invalid_data(&body)?;
        let days = body.days.unwrap_or(DEFAULT_CLEANUP_DAYS);
        let cutoff = Utc::now() - Duration::days(days);

        let deleted_count = self.store.delete_completed_before(cutoff).await?;
        tracing::info!("removed {} completed appointment(s) older than {} days", deleted_count, days);

        Ok(CleanupResultDto { deleted_count, days })
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Appointment, ServiceError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or(ServiceError::AppointmentNotFound(appointment_id))
    }

    async fn populate(&self, appointment: &Appointment) -> Result<AppointmentFilterDto, ServiceError> {
        let property = self.store.get_property_summary(appointment.property_id).await?;
        let agent = match appointment.assigned_agent {
            Some(agent_id) => self.store.get_user(agent_id).await?,
            None => None,
        };

        Ok(AppointmentFilterDto::filter_appointment(
            appointment,
            property.as_ref(),
            agent.as_ref(),
        ))
    }

    async fn populate_many(
        &self,
        appointments: &[Appointment],
    ) -> Result<Vec<AppointmentFilterDto>, ServiceError> {
        let mut property_ids: Vec<Uuid> = appointments.iter().map(|a| a.property_id).collect();
        property_ids.sort();
        property_ids.dedup();

        let mut agent_ids: Vec<Uuid> = appointments.iter().filter_map(|a| a.assigned_agent).collect();
        agent_ids.sort();
        agent_ids.dedup();

        let properties: HashMap<Uuid, _> = self
            .store
            .get_property_summaries(&property_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let agents: HashMap<Uuid, _> = self
            .store
            .get_users_by_ids(&agent_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(appointments
            .iter()
            .map(|a| {
                AppointmentFilterDto::filter_appointment(
                    a,
                    properties.get(&a.property_id),
                    a.assigned_agent.and_then(|id| agents.get(&id)),
                )
            })
            .collect())
    }
}
