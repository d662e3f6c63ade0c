use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored duration of a new booking; the schema accepts 15 to 240 minutes.
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

// Database labels are snake_case English; the JSON labels are the ones
// existing clients already send and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[serde(rename = "معلق")]
    Pending,
    #[serde(rename = "مؤكد")]
    Confirmed,
    #[serde(rename = "مكتمل")]
    Completed,
    #[serde(rename = "ملغي")]
    Cancelled,
    #[serde(rename = "لم يحضر")]
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Pending and confirmed appointments hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appointment_type", rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    #[serde(rename = "زيارة شخصية")]
    InPersonVisit,
    #[serde(rename = "زيارة افتراضية")]
    VirtualVisit,
    #[serde(rename = "استشارة")]
    Consultation,
    #[serde(rename = "تقييم عقار")]
    PropertyValuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appointment_priority", rename_all = "snake_case")]
pub enum AppointmentPriority {
    #[serde(rename = "منخفض")]
    Low,
    #[default]
    #[serde(rename = "متوسط")]
    Medium,
    #[serde(rename = "عالي")]
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub rating: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub property_id: Uuid,
    pub appointment_date: NaiveDate,
    /// Always stored as zero-padded `HH:MM`.
    pub appointment_time: String,
    pub duration: i32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub priority: AppointmentPriority,
    pub notes: Option<String>,
    pub assigned_agent: Option<Uuid>,
    pub feedback_rating: Option<i16>,
    pub feedback_comment: Option<String>,
    pub feedback_submitted_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn feedback(&self) -> Option<Feedback> {
        match (self.feedback_rating, self.feedback_submitted_at) {
            (Some(rating), Some(submitted_at)) => Some(Feedback {
                rating,
                comment: self.feedback_comment.clone(),
                submitted_at,
            }),
            _ => None,
        }
    }

    /// True when this appointment occupies `agent`'s slot at `date`/`time`.
    pub fn holds_slot(&self, agent: Uuid, date: NaiveDate, time: &str) -> bool {
        self.status.is_active()
            && self.assigned_agent == Some(agent)
            && self.appointment_date == date
            && self.appointment_time == time
    }
}

/// Everything needed to insert a booking; defaults are applied by the store.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub property_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub assigned_agent: Option<Uuid>,
}

/// Field changes produced by a status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl StatusChange {
    /// Stamps the timestamp belonging to `status`; other timestamps are left untouched.
    pub fn to(status: AppointmentStatus, cancellation_reason: Option<String>, now: DateTime<Utc>) -> Self {
        let mut change = StatusChange {
            status,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        };

        match status {
            AppointmentStatus::Confirmed => change.confirmed_at = Some(now),
            AppointmentStatus::Completed => change.completed_at = Some(now),
            AppointmentStatus::Cancelled => {
                change.cancelled_at = Some(now);
                change.cancellation_reason = cancellation_reason;
            }
            AppointmentStatus::Pending | AppointmentStatus::NoShow => {}
        }

        change
    }

    pub fn apply(&self, appointment: &mut Appointment) {
        appointment.status = self.status;
        if self.confirmed_at.is_some() {
            appointment.confirmed_at = self.confirmed_at;
        }
        if self.completed_at.is_some() {
            appointment.completed_at = self.completed_at;
        }
        if self.cancelled_at.is_some() {
            appointment.cancelled_at = self.cancelled_at;
        }
        if self.cancellation_reason.is_some() {
            appointment.cancellation_reason = self.cancellation_reason.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    AppointmentDate,
    CreatedAt,
    Status,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub priority: Option<AppointmentPriority>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for AppointmentFilter {
    fn default() -> Self {
        AppointmentFilter {
            status: None,
            appointment_type: None,
            priority: None,
            start_date: None,
            end_date: None,
            search: None,
            sort_by: SortField::AppointmentDate,
            sort_order: SortOrder::Asc,
            page: 1,
            limit: 10,
        }
    }
}

impl AppointmentFilter {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.limit as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentStats {
    pub total: i64,
    pub by_status: Vec<(AppointmentStatus, i64)>,
    pub by_type: Vec<(AppointmentType, i64)>,
    pub by_priority: Vec<(AppointmentPriority, i64)>,
    pub today: i64,
    pub this_week: i64,
    pub average_rating: Option<f64>,
}

impl AppointmentStats {
    pub fn count_for(&self, status: AppointmentStatus) -> i64 {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }
}
