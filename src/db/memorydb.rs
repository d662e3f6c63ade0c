//! In-process `Store` used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    db::{
        appointmentdb::{AppointmentExt, SlotWriteError},
        propertydb::PropertyExt,
        userdb::UserExt,
    },
    models::{
        appointmentmodel::{
            Appointment, AppointmentFilter, AppointmentPriority, AppointmentStats,
            AppointmentStatus, AppointmentType, NewAppointment, SortField, SortOrder,
            StatusChange, DEFAULT_DURATION_MINUTES,
        },
        propertymodel::PropertySummary,
        usermodel::{User, UserRole, UserStatus},
    },
};

#[derive(Default)]
pub struct MemoryStore {
    appointments: Mutex<Vec<Appointment>>,
    properties: Mutex<Vec<PropertySummary>>,
    users: Mutex<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property(&self, title: &str) -> PropertySummary {
        let property = PropertySummary {
            id: Uuid::new_v4(),
            title: title.to_string(),
            property_type: "فيلا".to_string(),
            price: 1_250_000.0,
            images: Json(vec!["/uploads/villa-1.jpg".to_string()]),
            street: Some("King Fahd Rd".to_string()),
            city: "Riyadh".to_string(),
            district: Some("Al Olaya".to_string()),
            country: Some("السعودية".to_string()),
        };
        self.properties.lock().unwrap().push(property.clone());
        property
    }

    pub fn add_user(&self, name: &str, role: UserRole, status: UserStatus) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: Some("+966500000000".to_string()),
            role,
            status,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    /// Inserts an appointment as-is, bypassing every check.
    pub fn insert_raw(&self, appointment: Appointment) {
        self.appointments.lock().unwrap().push(appointment);
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.lock().unwrap().len()
    }
}

fn slot_holder(
    appointments: &[Appointment],
    agent_id: Uuid,
    date: NaiveDate,
    time: &str,
    exclude: Option<Uuid>,
) -> Option<Uuid> {
    appointments
        .iter()
        .filter(|a| Some(a.id) != exclude)
        .find(|a| a.holds_slot(agent_id, date, time))
        .map(|a| a.id)
}

fn matches_filter(appointment: &Appointment, filter: &AppointmentFilter) -> bool {
    if filter.status.is_some_and(|s| s != appointment.status) {
        return false;
    }
    if filter.appointment_type.is_some_and(|t| t != appointment.appointment_type) {
        return false;
    }
    if filter.priority.is_some_and(|p| p != appointment.priority) {
        return false;
    }
    if filter.start_date.is_some_and(|d| appointment.appointment_date < d) {
        return false;
    }
    if filter.end_date.is_some_and(|d| appointment.appointment_date > d) {
        return false;
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let hit = [&appointment.name, &appointment.email, &appointment.phone]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    true
}

fn counts<T: Copy + Ord>(values: impl Iterator<Item = T>) -> Vec<(T, i64)> {
    let mut out: Vec<(T, i64)> = Vec::new();
    for value in values {
        match out.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => out.push((value, 1)),
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

#[async_trait]
impl AppointmentExt for MemoryStore {
    async fn create_appointment(
        &self,
        data: NewAppointment,
    ) -> Result<Appointment, SlotWriteError> {
        let mut appointments = self.appointments.lock().unwrap();

        if let Some(agent_id) = data.assigned_agent {
            if let Some(existing) = slot_holder(
                &appointments,
                agent_id,
                data.appointment_date,
                &data.appointment_time,
                None,
            ) {
                return Err(SlotWriteError::Taken(existing));
            }
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            phone: data.phone,
            property_id: data.property_id,
            appointment_date: data.appointment_date,
            appointment_time: data.appointment_time,
            duration: DEFAULT_DURATION_MINUTES,
            appointment_type: data.appointment_type,
            status: AppointmentStatus::Pending,
            priority: AppointmentPriority::Medium,
            notes: data.notes,
            assigned_agent: data.assigned_agent,
            feedback_rating: None,
            feedback_comment: None,
            feedback_submitted_at: None,
            cancellation_reason: None,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        appointments.push(appointment.clone());

        Ok(appointment)
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned())
    }

    async fn get_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<(Vec<Appointment>, i64), sqlx::Error> {
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| matches_filter(a, filter))
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            let ordering = match filter.sort_by {
                SortField::AppointmentDate => (a.appointment_date, &a.appointment_time)
                    .cmp(&(b.appointment_date, &b.appointment_time)),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Status => a.status.cmp(&b.status),
                SortField::Priority => a.priority.cmp(&b.priority),
            };
            match filter.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = found.len() as i64;
        let page = found
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();

        Ok((page, total))
    }

    async fn get_appointments_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.appointment_date == date)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.appointment_time.cmp(&b.appointment_time));
        Ok(found)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        change: StatusChange,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let mut appointments = self.appointments.lock().unwrap();
        Ok(appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .map(|a| {
                change.apply(a);
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn assign_appointment_agent(
        &self,
        appointment_id: Uuid,
        agent_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let mut appointments = self.appointments.lock().unwrap();
        Ok(appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .map(|a| {
                a.assigned_agent = Some(agent_id);
                if a.status == AppointmentStatus::Pending {
                    a.status = AppointmentStatus::Confirmed;
                }
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: &str,
    ) -> Result<Appointment, SlotWriteError> {
        let mut appointments = self.appointments.lock().unwrap();

        let agent = appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .map(|a| a.assigned_agent)
            .ok_or(SlotWriteError::Missing(appointment_id))?;

        if let Some(agent_id) = agent {
            if let Some(existing) =
                slot_holder(&appointments, agent_id, date, time, Some(appointment_id))
            {
                return Err(SlotWriteError::Taken(existing));
            }
        }

        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or(SlotWriteError::Missing(appointment_id))?;
        appointment.appointment_date = date;
        appointment.appointment_time = time.to_string();
        appointment.status = AppointmentStatus::Pending;
        appointment.updated_at = Utc::now();

        Ok(appointment.clone())
    }

    async fn save_appointment_feedback(
        &self,
        appointment_id: Uuid,
        rating: i16,
        comment: Option<String>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let mut appointments = self.appointments.lock().unwrap();
        Ok(appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .map(|a| {
                a.feedback_rating = Some(rating);
                a.feedback_comment = comment;
                a.feedback_submitted_at = Some(submitted_at);
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn delete_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut appointments = self.appointments.lock().unwrap();
        let before = appointments.len();
        appointments.retain(|a| a.id != appointment_id);
        Ok(appointments.len() < before)
    }

    async fn delete_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let mut appointments = self.appointments.lock().unwrap();
        let before = appointments.len();
        appointments.retain(|a| {
            !(a.status == AppointmentStatus::Completed
                && a.completed_at.is_some_and(|at| at < cutoff))
        });
        Ok((before - appointments.len()) as u64)
    }

    async fn get_appointment_stats(
        &self,
        today: NaiveDate,
        week_start: NaiveDate,
    ) -> Result<AppointmentStats, sqlx::Error> {
        let appointments = self.appointments.lock().unwrap();

        let ratings: Vec<f64> = appointments
            .iter()
            .filter_map(|a| a.feedback_rating)
            .map(f64::from)
            .collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };

        Ok(AppointmentStats {
            total: appointments.len() as i64,
            by_status: counts(appointments.iter().map(|a| a.status)),
            by_type: counts::<AppointmentType>(appointments.iter().map(|a| a.appointment_type)),
            by_priority: counts(appointments.iter().map(|a| a.priority)),
            today: appointments.iter().filter(|a| a.appointment_date == today).count() as i64,
            this_week: appointments
                .iter()
                .filter(|a| a.appointment_date >= week_start)
                .count() as i64,
            average_rating,
        })
    }
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| user_ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PropertyExt for MemoryStore {
    async fn get_property_summary(
        &self,
        property_id: Uuid,
    ) -> Result<Option<PropertySummary>, sqlx::Error> {
        Ok(self
            .properties
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == property_id)
            .cloned())
    }

    async fn get_property_summaries(
        &self,
        property_ids: &[Uuid],
    ) -> Result<Vec<PropertySummary>, sqlx::Error> {
        Ok(self
            .properties
            .lock()
            .unwrap()
            .iter()
            .filter(|p| property_ids.contains(&p.id))
            .cloned()
            .collect())
    }
}
