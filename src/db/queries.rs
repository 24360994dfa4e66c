use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Appointment, AppointmentStatus, BookingRecord, Role, Session, SessionStatus, Turn,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Sessions ──

pub fn get_session(conn: &Connection, id: &str) -> anyhow::Result<Option<Session>> {
    let result = conn.query_row(
        "SELECT id, record, status, appointment_id, created_at, updated_at FROM sessions WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    );

    match result {
        Ok((id, record_json, status, appointment_id, created_at, updated_at)) => {
            let record: BookingRecord = serde_json::from_str(&record_json).unwrap_or_else(|e| {
                tracing::warn!(session = %id, error = %e, "unreadable booking record, starting empty");
                BookingRecord::default()
            });
            Ok(Some(Session {
                id,
                record,
                status: SessionStatus::parse(&status),
                appointment_id,
                created_at: parse_ts(&created_at),
                updated_at: parse_ts(&updated_at),
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn upsert_session(conn: &Connection, session: &Session) -> anyhow::Result<()> {
    let record_json = serde_json::to_string(&session.record)?;
    conn.execute(
        "INSERT INTO sessions (id, record, status, appointment_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            record = excluded.record,
            status = excluded.status,
            appointment_id = excluded.appointment_id,
            updated_at = excluded.updated_at",
        params![
            session.id,
            record_json,
            session.status.as_str(),
            session.appointment_id,
            format_ts(&session.created_at),
            format_ts(&session.updated_at),
        ],
    )?;
    Ok(())
}

// ── Turns ──

pub fn append_turn(conn: &Connection, session_id: &str, turn: &Turn) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO turns (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            session_id,
            turn.role.as_str(),
            turn.text,
            format_ts(&turn.timestamp)
        ],
    )?;
    Ok(())
}

fn parse_turn_row(row: &rusqlite::Row) -> rusqlite::Result<Turn> {
    let role: String = row.get(0)?;
    let created_at: String = row.get(2)?;
    Ok(Turn {
        role: Role::parse(&role),
        text: row.get(1)?,
        timestamp: parse_ts(&created_at),
    })
}

pub fn list_turns(conn: &Connection, session_id: &str) -> anyhow::Result<Vec<Turn>> {
    let mut stmt = conn.prepare(
        "SELECT role, content, created_at FROM turns WHERE session_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![session_id], parse_turn_row)?;

    let mut turns = vec![];
    for row in rows {
        turns.push(row?);
    }
    Ok(turns)
}

/// The last `n` turns, oldest first.
pub fn recent_turns(conn: &Connection, session_id: &str, n: usize) -> anyhow::Result<Vec<Turn>> {
    let mut stmt = conn.prepare(
        "SELECT role, content, created_at FROM (
            SELECT id, role, content, created_at FROM turns
            WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2
         ) ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![session_id, n as i64], parse_turn_row)?;

    let mut turns = vec![];
    for row in rows {
        turns.push(row?);
    }
    Ok(turns)
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, session_id, customer_name, service, stylist, date, time, \
     duration_minutes, email, status, created_at, updated_at";

pub fn create_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO appointments ({APPOINTMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            appointment.id,
            appointment.session_id,
            appointment.customer_name,
            appointment.service,
            appointment.stylist,
            appointment.date.format("%Y-%m-%d").to_string(),
            appointment.time.format("%H:%M").to_string(),
            appointment.duration_minutes,
            appointment.email,
            appointment.status.as_str(),
            format_ts(&appointment.created_at),
            format_ts(&appointment.updated_at),
        ],
    )?;
    Ok(())
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(5)?;
    let time_str: String = row.get(6)?;
    let status_str: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Appointment {
        id: row.get(0)?,
        session_id: row.get(1)?,
        customer_name: row.get(2)?,
        service: row.get(3)?,
        stylist: row.get(4)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")?,
        time: NaiveTime::parse_from_str(&time_str, "%H:%M")?,
        duration_minutes: row.get(7)?,
        email: row.get(8)?,
        status: AppointmentStatus::parse(&status_str),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY date DESC, time DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Active appointments a stylist has on a given day.
pub fn appointments_for_stylist_on(
    conn: &Connection,
    stylist: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE stylist = ?1 AND date = ?2 AND status != 'cancelled' ORDER BY time ASC"
    ))?;
    let rows = stmt.query_map(
        params![stylist, date.format("%Y-%m-%d").to_string()],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::DateToken;

    fn appointment(id: &str, stylist: &str, date: NaiveDate, hour: u32) -> Appointment {
        let now = Utc::now().naive_utc();
        Appointment {
            id: id.to_string(),
            session_id: None,
            customer_name: Some("Priya".to_string()),
            service: "Haircut".to_string(),
            stylist: stylist.to_string(),
            date,
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            duration_minutes: 60,
            email: "priya@gmail.com".to_string(),
            status: AppointmentStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_session_roundtrip_keeps_record() {
        let conn = init_db(":memory:").unwrap();
        assert!(get_session(&conn, "s1").unwrap().is_none());

        let mut session = Session::new("s1");
        session.record.service = Some("Coloring".to_string());
        session.record.date = Some(DateToken::Tomorrow);
        upsert_session(&conn, &session).unwrap();

        session.status = SessionStatus::Booked;
        session.appointment_id = Some("a1".to_string());
        upsert_session(&conn, &session).unwrap();

        let loaded = get_session(&conn, "s1").unwrap().unwrap();
        assert_eq!(loaded.record, session.record);
        assert_eq!(loaded.status, SessionStatus::Booked);
        assert_eq!(loaded.appointment_id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_appointment_queries() {
        let conn = init_db(":memory:").unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 6, 17).unwrap();
        create_appointment(&conn, &appointment("a1", "Riya", day, 11)).unwrap();
        create_appointment(&conn, &appointment("a2", "Maya", day, 11)).unwrap();
        let mut cancelled = appointment("a3", "Riya", day, 15);
        cancelled.status = AppointmentStatus::Cancelled;
        create_appointment(&conn, &cancelled).unwrap();

        let loaded = get_appointment_by_id(&conn, "a1").unwrap().unwrap();
        assert_eq!(loaded.time, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(loaded.date, day);

        let riya = appointments_for_stylist_on(&conn, "Riya", day).unwrap();
        assert_eq!(riya.len(), 1);
        assert_eq!(list_appointments(&conn, 10).unwrap().len(), 3);
        assert!(get_appointment_by_id(&conn, "missing").unwrap().is_none());
    }
}
