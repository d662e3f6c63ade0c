use std::{borrow::Cow, collections::BTreeMap};

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    models::{
        appointmentmodel::{
            Appointment, AppointmentFilter, AppointmentPriority, AppointmentStats,
            AppointmentStatus, AppointmentType, Feedback, SortField, SortOrder,
        },
        propertymodel::{Address, PropertySummary},
        usermodel::User,
    },
    utils::schedule::{parse_date, TIME_REGEX},
};

lazy_static! {
    /// Saudi mobile numbers: optional +966 / 966 / 0 prefix, then 5 and eight digits.
    pub static ref PHONE_REGEX: Regex = Regex::new(r"^(\+?966|0)?5\d{8}$").unwrap();
}

pub const DEFAULT_CLEANUP_DAYS: i64 = 90;

fn error_with(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() < 2 {
        return Err(error_with("length", "Name must be at least 2 characters"));
    }
    Ok(())
}

fn validate_object_id(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value.trim())
        .map(|_| ())
        .map_err(|_| error_with("invalid_id", "Identifier is invalid"))
}

fn validate_date(value: &str) -> Result<(), ValidationError> {
    parse_date(value)
        .map(|_| ())
        .ok_or_else(|| error_with("invalid_date", "Appointment date is invalid"))
}

fn validate_type(value: &str) -> Result<(), ValidationError> {
    parse_label::<AppointmentType>(value)
        .map(|_| ())
        .ok_or_else(|| error_with("invalid_type", "Appointment type is invalid"))
}

fn validate_status(value: &str) -> Result<(), ValidationError> {
    parse_label::<AppointmentStatus>(value)
        .map(|_| ())
        .ok_or_else(|| error_with("invalid_status", "Appointment status is invalid"))
}

fn validate_priority(value: &str) -> Result<(), ValidationError> {
    parse_label::<AppointmentPriority>(value)
        .map(|_| ())
        .ok_or_else(|| error_with("invalid_priority", "Appointment priority is invalid"))
}

fn validate_sort_by(value: &str) -> Result<(), ValidationError> {
    parse_sort_field(value)
        .map(|_| ())
        .ok_or_else(|| error_with("invalid_sort", "Sort field is invalid"))
}

fn validate_sort_order(value: &str) -> Result<(), ValidationError> {
    parse_sort_order(value)
        .map(|_| ())
        .ok_or_else(|| error_with("invalid_sort_order", "Sort order must be asc or desc"))
}

fn validate_cancellation_reason(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if !(5..=200).contains(&len) {
        return Err(error_with("length", "Cancellation reason must be between 5 and 200 characters"));
    }
    Ok(())
}

fn validate_comment(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if !(5..=500).contains(&len) {
        return Err(error_with("length", "Comment must be between 5 and 500 characters"));
    }
    Ok(())
}

/// Parses one of the wire labels (e.g. `"مؤكد"`) into its enum.
pub fn parse_label<T: serde::de::DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_string())).ok()
}

fn parse_sort_field(value: &str) -> Option<SortField> {
    match value.trim() {
        "appointmentDate" => Some(SortField::AppointmentDate),
        "createdAt" => Some(SortField::CreatedAt),
        "status" => Some(SortField::Status),
        "priority" => Some(SortField::Priority),
        _ => None,
    }
}

fn parse_sort_order(value: &str) -> Option<SortOrder> {
    match value.trim() {
        "asc" => Some(SortOrder::Asc),
        "desc" => Some(SortOrder::Desc),
        _ => None,
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Every field is deserialized leniently so that a bad value shows up as a
// field violation instead of a body rejection.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAppointmentDto {
    #[validate(custom = "validate_name")]
    pub name: String,

    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    #[validate(regex(path = "PHONE_REGEX", message = "Phone number is invalid"))]
    pub phone: String,

    #[validate(custom = "validate_object_id")]
    pub property_id: String,

    #[validate(custom = "validate_date")]
    pub appointment_date: String,

    #[validate(regex(path = "TIME_REGEX", message = "Appointment time is invalid"))]
    pub appointment_time: String,

    #[serde(rename = "type")]
    #[validate(custom = "validate_type")]
    pub appointment_type: Option<String>,

    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

impl CreateAppointmentDto {
    pub fn trimmed_notes(&self) -> Option<String> {
        trimmed(self.notes.clone())
    }

    pub fn parsed_type(&self) -> AppointmentType {
        self.appointment_type
            .as_deref()
            .and_then(parse_label)
            .unwrap_or_default()
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateStatusDto {
    #[validate(custom = "validate_status")]
    pub status: String,

    #[validate(custom = "validate_cancellation_reason")]
    pub cancellation_reason: Option<String>,
}

impl UpdateStatusDto {
    pub fn parsed_status(&self) -> Option<AppointmentStatus> {
        parse_label(&self.status)
    }

    pub fn trimmed_reason(&self) -> Option<String> {
        trimmed(self.cancellation_reason.clone())
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssignAgentDto {
    #[validate(custom = "validate_object_id")]
    pub assigned_agent: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RescheduleAppointmentDto {
    #[validate(custom = "validate_date")]
    pub appointment_date: String,

    #[validate(regex(path = "TIME_REGEX", message = "Appointment time is invalid"))]
    pub appointment_time: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackDto {
    #[validate(
        required(message = "Rating is required"),
        range(min = 1, max = 5, message = "Rating must be between 1 and 5")
    )]
    pub rating: Option<i64>,

    #[validate(custom = "validate_comment")]
    pub comment: Option<String>,
}

impl FeedbackDto {
    pub fn trimmed_comment(&self) -> Option<String> {
        trimmed(self.comment.clone())
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupDto {
    #[validate(range(min = 1, max = 36500, message = "Days must be between 1 and 36500"))]
    pub days: Option<i64>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppointmentQueryDto {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    pub search: Option<String>,

    #[validate(custom = "validate_status")]
    pub status: Option<String>,

    #[serde(rename = "type")]
    #[validate(custom = "validate_type")]
    pub appointment_type: Option<String>,

    #[validate(custom = "validate_priority")]
    pub priority: Option<String>,

    #[validate(custom = "validate_date")]
    pub start_date: Option<String>,

    #[validate(custom = "validate_date")]
    pub end_date: Option<String>,

    #[validate(custom = "validate_sort_by")]
    pub sort_by: Option<String>,

    #[validate(custom = "validate_sort_order")]
    pub sort_order: Option<String>,
}

impl AppointmentQueryDto {
    /// Call after `validate()`; unparsable values fall back to "no filter".
    pub fn into_filter(self) -> AppointmentFilter {
        let defaults = AppointmentFilter::default();
        AppointmentFilter {
            status: self.status.as_deref().and_then(parse_label),
            appointment_type: self.appointment_type.as_deref().and_then(parse_label),
            priority: self.priority.as_deref().and_then(parse_label),
            start_date: self.start_date.as_deref().and_then(parse_date),
            end_date: self.end_date.as_deref().and_then(parse_date),
            search: trimmed(self.search),
            sort_by: self.sort_by.as_deref().and_then(parse_sort_field).unwrap_or(defaults.sort_by),
            sort_order: self.sort_order.as_deref().and_then(parse_sort_order).unwrap_or(defaults.sort_order),
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyFilterDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub price: f64,
    pub images: Vec<String>,
    pub address: Address,
}

impl PropertyFilterDto {
    pub fn from_property(property: &PropertySummary) -> Self {
        PropertyFilterDto {
            id: property.id,
            title: property.title.clone(),
            property_type: property.property_type.clone(),
            price: property.price,
            images: property.images.0.clone(),
            address: property.address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentFilterDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl AgentFilterDto {
    pub fn from_user(user: &User) -> Self {
        AgentFilterDto {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// A reference that is replaced by the referenced record when it can be loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Populated<T> {
    Record(T),
    Id(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentFilterDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub property_id: Populated<PropertyFilterDto>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub duration: i32,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub priority: AppointmentPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub assigned_agent: Option<Populated<AgentFilterDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentFilterDto {
    pub fn filter_appointment(
        appointment: &Appointment,
        property: Option<&PropertySummary>,
        agent: Option<&User>,
    ) -> Self {
        let property_id = match property {
            Some(p) => Populated::Record(PropertyFilterDto::from_property(p)),
            None => Populated::Id(appointment.property_id),
        };
        let assigned_agent = appointment.assigned_agent.map(|agent_id| match agent {
            Some(a) => Populated::Record(AgentFilterDto::from_user(a)),
            None => Populated::Id(agent_id),
        });

        AppointmentFilterDto {
            id: appointment.id,
            name: appointment.name.clone(),
            email: appointment.email.clone(),
            phone: appointment.phone.clone(),
            property_id,
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time.clone(),
            duration: appointment.duration,
            appointment_type: appointment.appointment_type,
            status: appointment.status,
            priority: appointment.priority,
            notes: appointment.notes.clone(),
            assigned_agent,
            feedback: appointment.feedback(),
            cancellation_reason: appointment.cancellation_reason.clone(),
            confirmed_at: appointment.confirmed_at,
            completed_at: appointment.completed_at,
            cancelled_at: appointment.cancelled_at,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_appointments: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationDto {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit = limit.max(1) as i64;
        let total_pages = ((total + limit - 1) / limit) as u32;
        PaginationDto {
            current_page: page,
            total_pages,
            total_appointments: total,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelCountDto<T> {
    #[serde(rename = "_id")]
    pub label: T,
    pub count: i64,
}

fn labelled<T>(pairs: Vec<(T, i64)>) -> Vec<LabelCountDto<T>> {
    pairs
        .into_iter()
        .map(|(label, count)| LabelCountDto { label, count })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentListResponseDto {
    pub appointments: Vec<AppointmentFilterDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAppointmentsDto {
    pub date: NaiveDate,
    pub total: usize,
    pub appointments: Vec<AppointmentFilterDto>,
    pub appointments_by_status: BTreeMap<AppointmentStatus, Vec<AppointmentFilterDto>>,
}

impl DailyAppointmentsDto {
    pub fn new(date: NaiveDate, appointments: Vec<AppointmentFilterDto>) -> Self {
        let mut appointments_by_status: BTreeMap<AppointmentStatus, Vec<AppointmentFilterDto>> =
            BTreeMap::new();
        for appointment in &appointments {
            appointments_by_status
                .entry(appointment.status)
                .or_default()
                .push(appointment.clone());
        }

        DailyAppointmentsDto {
            date,
            total: appointments.len(),
            appointments,
            appointments_by_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsOverviewDto {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub no_show: i64,
    pub today: i64,
    pub this_week: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsDistributionsDto {
    pub by_type: Vec<LabelCountDto<AppointmentType>>,
    pub by_priority: Vec<LabelCountDto<AppointmentPriority>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStatsDto {
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentStatsDto {
    pub overview: StatsOverviewDto,
    pub distributions: StatsDistributionsDto,
    pub feedback: FeedbackStatsDto,
}

impl From<AppointmentStats> for AppointmentStatsDto {
    fn from(stats: AppointmentStats) -> Self {
        AppointmentStatsDto {
            overview: StatsOverviewDto {
                total: stats.total,
                pending: stats.count_for(AppointmentStatus::Pending),
                confirmed: stats.count_for(AppointmentStatus::Confirmed),
                completed: stats.count_for(AppointmentStatus::Completed),
                cancelled: stats.count_for(AppointmentStatus::Cancelled),
                no_show: stats.count_for(AppointmentStatus::NoShow),
                today: stats.today,
                this_week: stats.this_week,
            },
            distributions: StatsDistributionsDto {
                by_type: labelled(stats.by_type),
                by_priority: labelled(stats.by_priority),
            },
            feedback: FeedbackStatsDto {
                average_rating: stats.average_rating.unwrap_or(0.0),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResultDto {
    pub deleted_count: u64,
    pub days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::field_violations;

    fn valid_booking() -> CreateAppointmentDto {
        CreateAppointmentDto {
            name: "Sara Ali".to_string(),
            email: "sara@example.com".to_string(),
            phone: "+966512345678".to_string(),
            property_id: Uuid::new_v4().to_string(),
            appointment_date: "2030-01-01".to_string(),
            appointment_time: "10:00".to_string(),
            appointment_type: None,
            notes: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_booking() {
        assert!(valid_booking().validate().is_ok());
    }

    #[test]
    fn reports_all_bad_fields_at_once() {
        let dto = CreateAppointmentDto {
            name: " a ".to_string(),
            email: "not-an-email".to_string(),
            phone: "12345".to_string(),
            property_id: "abc".to_string(),
            appointment_date: "tomorrow".to_string(),
            appointment_time: "25:00".to_string(),
            appointment_type: Some("house party".to_string()),
            notes: Some("x".repeat(501)),
        };

        let errors = dto.validate().unwrap_err();
        let fields: Vec<String> = field_violations(&errors).into_iter().map(|v| v.field).collect();

        assert_eq!(
            fields,
            vec![
                "appointmentDate",
                "appointmentTime",
                "email",
                "name",
                "notes",
                "phone",
                "propertyId",
                "type",
            ]
        );
    }

    #[test]
    fn phone_formats() {
        for ok in ["0512345678", "512345678", "966512345678", "+966512345678"] {
            assert!(PHONE_REGEX.is_match(ok), "{ok} should be accepted");
        }
        for bad in ["0412345678", "+96651234567", "05123456789", "phone"] {
            assert!(!PHONE_REGEX.is_match(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn missing_type_defaults_to_in_person_visit() {
        assert_eq!(valid_booking().parsed_type(), AppointmentType::InPersonVisit);

        let mut dto = valid_booking();
        dto.appointment_type = Some("استشارة".to_string());
        assert_eq!(dto.parsed_type(), AppointmentType::Consultation);
    }

    #[test]
    fn cancellation_reason_bounds() {
        let short = UpdateStatusDto {
            status: "ملغي".to_string(),
            cancellation_reason: Some("no".to_string()),
        };
        assert!(short.validate().is_err());

        let ok = UpdateStatusDto {
            status: "ملغي".to_string(),
            cancellation_reason: Some("client travelled".to_string()),
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.parsed_status(), Some(AppointmentStatus::Cancelled));
    }

    #[test]
    fn feedback_rating_is_required_and_bounded() {
        assert!(FeedbackDto { rating: None, comment: None }.validate().is_err());
        assert!(FeedbackDto { rating: Some(6), comment: None }.validate().is_err());
        assert!(FeedbackDto { rating: Some(0), comment: None }.validate().is_err());
        assert!(FeedbackDto { rating: Some(4), comment: Some("good".to_string()) }.validate().is_err());
        assert!(FeedbackDto { rating: Some(4), comment: Some("great visit".to_string()) }.validate().is_ok());
    }

    #[test]
    fn query_maps_into_filter() {
        let query = AppointmentQueryDto {
            page: Some(2),
            limit: Some(25),
            search: Some("  sara ".to_string()),
            status: Some("مؤكد".to_string()),
            sort_by: Some("createdAt".to_string()),
            sort_order: Some("desc".to_string()),
            start_date: Some("2030-01-01".to_string()),
            ..Default::default()
        };
        assert!(query.validate().is_ok());

        let filter = query.into_filter();
        assert_eq!(filter.page, 2);
        assert_eq!(filter.limit, 25);
        assert_eq!(filter.search.as_deref(), Some("sara"));
        assert_eq!(filter.status, Some(AppointmentStatus::Confirmed));
        assert_eq!(filter.sort_by, SortField::CreatedAt);
        assert_eq!(filter.sort_order, SortOrder::Desc);
        assert_eq!(filter.start_date, NaiveDate::from_ymd_opt(2030, 1, 1));
    }

    #[test]
    fn limit_above_one_hundred_is_rejected() {
        let query = AppointmentQueryDto { limit: Some(101), ..Default::default() };
        assert!(query.validate().is_err());
    }

    #[test]
    fn pagination_metadata() {
        let p = PaginationDto::new(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(p.has_prev_page);

        let empty = PaginationDto::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_prev_page);
    }

    #[test]
    fn stats_fill_missing_statuses_with_zero() {
        let stats = AppointmentStats {
            total: 3,
            by_status: vec![(AppointmentStatus::Pending, 2), (AppointmentStatus::Completed, 1)],
            by_type: vec![(AppointmentType::Consultation, 3)],
            by_priority: vec![(AppointmentPriority::Medium, 3)],
            today: 1,
            this_week: 3,
            average_rating: None,
        };

        let dto = AppointmentStatsDto::from(stats);
        assert_eq!(dto.overview.pending, 2);
        assert_eq!(dto.overview.no_show, 0);
        assert_eq!(dto.feedback.average_rating, 0.0);

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["overview"]["noShow"], 0);
        assert_eq!(json["distributions"]["byType"][0]["_id"], "استشارة");
        assert_eq!(json["distributions"]["byType"][0]["count"], 3);
    }
}
