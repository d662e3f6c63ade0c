use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::DBClient,
    models::appointmentmodel::{
        Appointment, AppointmentFilter, AppointmentPriority, AppointmentStats, AppointmentStatus,
        AppointmentType, NewAppointment, SortField, SortOrder, StatusChange,
        DEFAULT_DURATION_MINUTES,
    },
};

const APPOINTMENT_COLUMNS: &str = r#"
    id, name, email, phone, property_id, appointment_date, appointment_time, duration,
    appointment_type, status, priority, notes, assigned_agent,
    feedback_rating, feedback_comment, feedback_submitted_at,
    cancellation_reason, confirmed_at, completed_at, cancelled_at,
    created_at, updated_at
"#;

/// Failure of a write that must keep an agent's slot free.
#[derive(Error, Debug)]
pub enum SlotWriteError {
    #[error("slot already held by appointment {0}")]
    Taken(Uuid),

    #[error("appointment {0} not found")]
    Missing(Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AppointmentExt: Send + Sync {
    /// Inserts a pending booking. Fails with `Taken` if the booking carries an
    /// agent whose slot is already held by an active appointment.
    async fn create_appointment(
        &self,
        data: NewAppointment,
    ) -> Result<Appointment, SlotWriteError>;

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error>;

    /// One page of matches plus the total number of matches.
    async fn get_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<(Vec<Appointment>, i64), sqlx::Error>;

    async fn get_appointments_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, sqlx::Error>;

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        change: StatusChange,
    ) -> Result<Option<Appointment>, sqlx::Error>;

    /// Sets the agent and moves a pending appointment to confirmed.
    async fn assign_appointment_agent(
        &self,
        appointment_id: Uuid,
        agent_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error>;

    /// Moves the appointment to a new slot and resets it to pending.
    async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: &str,
    ) -> Result<Appointment, SlotWriteError>;

    async fn save_appointment_feedback(
        &self,
        appointment_id: Uuid,
        rating: i16,
        comment: Option<String>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, sqlx::Error>;

    async fn delete_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    async fn delete_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    async fn get_appointment_stats(
        &self,
        today: NaiveDate,
        week_start: NaiveDate,
    ) -> Result<AppointmentStats, sqlx::Error>;
}

/// Serializes slot writes per agent until the surrounding transaction ends.
async fn lock_agent_schedule(
    tx: &mut Transaction<'_, Postgres>,
    agent_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(agent_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn find_slot_holder(
    tx: &mut Transaction<'_, Postgres>,
    agent_id: Uuid,
    date: NaiveDate,
    time: &str,
    exclude: Option<Uuid>,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM appointments
        WHERE assigned_agent = $1
          AND appointment_date = $2
          AND appointment_time = $3
          AND status IN ('pending', 'confirmed')
          AND ($4::uuid IS NULL OR id <> $4)
        LIMIT 1
        "#,
    )
    .bind(agent_id)
    .bind(date)
    .bind(time)
    .bind(exclude)
    .fetch_optional(&mut **tx)
    .await
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AppointmentFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(appointment_type) = filter.appointment_type {
        builder.push(" AND appointment_type = ").push_bind(appointment_type);
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND priority = ").push_bind(priority);
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND appointment_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND appointment_date <= ").push_bind(end);
    }
    if let Some(search) = &filter.search {
        let pattern = escape_like(search);
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn order_clause(filter: &AppointmentFilter) -> String {
    let direction = match filter.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    match filter.sort_by {
        SortField::AppointmentDate => format!(
            "appointment_date {d}, appointment_time {d}, id",
            d = direction
        ),
        SortField::CreatedAt => format!("created_at {}, id", direction),
        SortField::Status => format!("status {}, id", direction),
        SortField::Priority => format!("priority {}, id", direction),
    }
}

#[async_trait]
impl AppointmentExt for DBClient {
    async fn create_appointment(
        &self,
        data: NewAppointment,
    ) -> Result<Appointment, SlotWriteError> {
        let mut tx = self.pool.begin().await?;

        if let Some(agent_id) = data.assigned_agent {
            lock_agent_schedule(&mut tx, agent_id).await?;
            if let Some(existing) = find_slot_holder(
                &mut tx,
                agent_id,
                data.appointment_date,
                &data.appointment_time,
                None,
            )
            .await?
            {
                return Err(SlotWriteError::Taken(existing));
            }
        }

        let sql = format!(
            r#"
            INSERT INTO appointments (
                id, name, email, phone, property_id, appointment_date, appointment_time,
                duration, appointment_type, status, priority, notes, assigned_agent
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );

        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(Uuid::new_v4())
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(data.property_id)
            .bind(data.appointment_date)
            .bind(&data.appointment_time)
            .bind(DEFAULT_DURATION_MINUTES)
            .bind(data.appointment_type)
            .bind(AppointmentStatus::Pending)
            .bind(AppointmentPriority::Medium)
            .bind(&data.notes)
            .bind(data.assigned_agent)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(appointment)
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE id = $1",
            APPOINTMENT_COLUMNS
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<(Vec<Appointment>, i64), sqlx::Error> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM appointments WHERE TRUE");
        push_filters(&mut count_builder, filter);

        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM appointments WHERE TRUE",
            APPOINTMENT_COLUMNS
        ));
        push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY ")
            .push(order_clause(filter))
            .push(" LIMIT ")
            .push_bind(filter.limit as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let appointments = builder
            .build_query_as::<Appointment>()
            .fetch_all(&self.pool)
            .await?;

        Ok((appointments, total))
    }

    async fn get_appointments_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE appointment_date = $1 ORDER BY appointment_time ASC, created_at ASC",
            APPOINTMENT_COLUMNS
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        change: StatusChange,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE appointments
            SET status = $2,
                confirmed_at = COALESCE($3, confirmed_at),
                completed_at = COALESCE($4, completed_at),
                cancelled_at = COALESCE($5, cancelled_at),
                cancellation_reason = COALESCE($6, cancellation_reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(change.status)
            .bind(change.confirmed_at)
            .bind(change.completed_at)
            .bind(change.cancelled_at)
            .bind(change.cancellation_reason)
            .fetch_optional(&self.pool)
            .await
    }

    async fn assign_appointment_agent(
        &self,
        appointment_id: Uuid,
        agent_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE appointments
            SET assigned_agent = $2,
                status = CASE WHEN status = 'pending' THEN 'confirmed'::appointment_status ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: &str,
    ) -> Result<Appointment, SlotWriteError> {
        let mut tx = self.pool.begin().await?;

        let agent: Option<Option<Uuid>> = sqlx::query_scalar(
            "SELECT assigned_agent FROM appointments WHERE id = $1 FOR UPDATE",
        )
        .bind(appointment_id)
        .fetch_optional(&mut *tx)
        .await?;

        let agent = agent.ok_or(SlotWriteError::Missing(appointment_id))?;

        if let Some(agent_id) = agent {
            lock_agent_schedule(&mut tx, agent_id).await?;
            if let Some(existing) =
                find_slot_holder(&mut tx, agent_id, date, time, Some(appointment_id)).await?
            {
                return Err(SlotWriteError::Taken(existing));
            }
        }

        let sql = format!(
            r#"
            UPDATE appointments
            SET appointment_date = $2,
                appointment_time = $3,
                status = 'pending',
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );

        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(date)
            .bind(time)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(appointment)
    }

    async fn save_appointment_feedback(
        &self,
        appointment_id: Uuid,
        rating: i16,
        comment: Option<String>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE appointments
            SET feedback_rating = $2,
                feedback_comment = $3,
                feedback_submitted_at = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(rating)
            .bind(comment)
            .bind(submitted_at)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(appointment_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM appointments WHERE status = 'completed' AND completed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_appointment_stats(
        &self,
        today: NaiveDate,
        week_start: NaiveDate,
    ) -> Result<AppointmentStats, sqlx::Error> {
        let by_status = sqlx::query_as::<_, (AppointmentStatus, i64)>(
            "SELECT status, COUNT(*) FROM appointments GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool);

        let by_type = sqlx::query_as::<_, (AppointmentType, i64)>(
            "SELECT appointment_type, COUNT(*) FROM appointments GROUP BY appointment_type ORDER BY appointment_type",
        )
        .fetch_all(&self.pool);

        let by_priority = sqlx::query_as::<_, (AppointmentPriority, i64)>(
            "SELECT priority, COUNT(*) FROM appointments GROUP BY priority ORDER BY priority",
        )
        .fetch_all(&self.pool);

        let today_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM appointments WHERE appointment_date = $1",
        )
        .bind(today)
        .fetch_one(&self.pool);

        let week_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM appointments WHERE appointment_date >= $1",
        )
        .bind(week_start)
        .fetch_one(&self.pool);

        let average_rating = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(feedback_rating)::float8 FROM appointments WHERE feedback_rating IS NOT NULL",
        )
        .fetch_one(&self.pool);

        let (by_status, by_type, by_priority, today, this_week, average_rating) = tokio::try_join!(
            by_status,
            by_type,
            by_priority,
            today_count,
            week_count,
            average_rating
        )?;

        Ok(AppointmentStats {
            total: by_status.iter().map(|(_, count)| count).sum(),
            by_status,
            by_type,
            by_priority,
            today,
            this_week,
            average_rating,
        })
    }
}
