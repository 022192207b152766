use actix_files::Files;
use actix_session::Session;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::admin::{
    booking_details, delete_all_bookings, edit_booking, BookingEdit, BookingEditRequest, DELETED_MESSAGE,
    UPDATED_MESSAGE,
};
use crate::auth::{session_middleware, sign_in, sign_out, AdminCredentials, AdminUser, LoginRequest};
use crate::clock::Clock;
use crate::config::Config;
use crate::dashboard::compute_stats;
use crate::display::{
    day_badge, dialog_title, format_long_date, format_time_12h, format_time_short, format_week_range, status_label,
};
use crate::error::AppError;
use crate::form::{check_duplicates, validate_submission, ReservationRequest};
use crate::models::BookingWithPlayers;
use crate::reservation::{reserve_slot, ReservationOutcome};
use crate::schedule::slot_utils::week_end;
use crate::schedule::{
    day_summaries, parse_date, session_state, slots_for_week, time_listing, week_number, week_start, Season,
    SessionState, SlotStatus, WeekCursor,
};
use crate::store::BookingStore;
use crate::view::FETCH_FAILED;

/// Shared by every worker; the store does its own synchronization.
pub struct AppState<S> {
    pub store: S,
    pub season: Season,
    pub clock: Clock,
    pub admin: AdminCredentials,
}

impl<S: BookingStore> AppState<S> {
    pub fn new(store: S, season: Season, clock: Clock, admin: AdminCredentials) -> Self {
        Self {
            store,
            season,
            clock,
            admin,
        }
    }
}

type State<S> = web::Data<AppState<S>>;

#[derive(Deserialize)]
pub struct ScheduleQuery {
    week: Option<String>,
}

#[derive(Serialize)]
struct ScheduleResponse {
    start: NaiveDate,
    end: NaiveDate,
    label: String,
    week_number: i64,
    has_previous: bool,
    has_next: bool,
    days: Vec<ScheduleDay>,
}

#[derive(Serialize)]
struct ScheduleDay {
    date: NaiveDate,
    label: String,
    slots: Vec<ScheduleSlot>,
}

#[derive(Serialize)]
struct ScheduleSlot {
    time: NaiveTime,
    label: String,
    status: SlotStatus,
    status_label: &'static str,
    /// Title of the booking dialog, only for slots that can be booked.
    dialog_title: Option<String>,
}

#[derive(Deserialize)]
pub struct RosterCheck {
    #[serde(default)]
    team_a: Vec<String>,
    #[serde(default)]
    team_b: Vec<String>,
}

#[derive(Serialize)]
struct DayOverview {
    date: NaiveDate,
    label: String,
    booked: usize,
    badge: String,
}

#[derive(Serialize)]
struct TimeRow<'a> {
    time: NaiveTime,
    label: String,
    booking: Option<&'a BookingWithPlayers>,
}

#[derive(Serialize)]
struct BookedSession<'a> {
    #[serde(flatten)]
    booking: &'a BookingWithPlayers,
    state: SessionState,
    date_label: String,
    time_label: String,
}

fn bad_date(value: &str) -> AppError {
    AppError::BadRequest(format!("invalid date {value:?}"))
}

// Visitor API

async fn get_schedule<S: BookingStore>(
    query: web::Query<ScheduleQuery>,
    state: State<S>,
) -> Result<HttpResponse, AppError> {
    let now = state.clock.now();
    let today = now.date();
    let cursor = match query.week.as_deref() {
        None => WeekCursor::initial(today, &state.season),
        Some(week) => {
            let requested = parse_date(week).ok_or_else(|| bad_date(week))?;
            WeekCursor::seek(requested, today, &state.season)
                .ok_or_else(|| AppError::BadRequest(format!("week of {requested} can't be shown")))?
        }
    };

    let bookings = state
        .store
        .bookings_between(cursor.start(), cursor.end())
        .await
        .map_err(AppError::store(FETCH_FAILED))?;

    let days = slots_for_week(cursor.anchor(), &bookings, now, &state.season)
        .into_iter()
        .map(|day| ScheduleDay {
            date: day.date,
            label: day.date.format("%a %-d").to_string(),
            slots: day
                .slots
                .into_iter()
                .map(|slot| ScheduleSlot {
                    time: slot.time,
                    label: format_time_short(slot.time),
                    status: slot.status,
                    status_label: status_label(slot.status),
                    dialog_title: slot
                        .status
                        .is_bookable()
                        .then(|| dialog_title(slot.date, slot.time)),
                })
                .collect(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(ScheduleResponse {
        start: cursor.start(),
        end: cursor.end(),
        label: format_week_range(cursor.start(), cursor.end()),
        week_number: week_number(cursor.start(), &state.season),
        has_previous: cursor.previous(today).is_some(),
        has_next: cursor.next(&state.season).is_some(),
        days,
    }))
}

async fn check_roster(body: web::Json<RosterCheck>) -> HttpResponse {
    let names: Vec<&str> = body.team_a.iter().chain(&body.team_b).map(String::as_str).collect();
    let duplicate = check_duplicates(&names);
    HttpResponse::Ok().json(json!({
        "success": true,
        "duplicate": duplicate,
        "error": duplicate.as_ref().map(|name| format!("Duplicate player name: {name}")),
    }))
}

async fn create_booking<S: BookingStore>(
    body: web::Json<ReservationRequest>,
    state: State<S>,
) -> Result<HttpResponse, AppError> {
    let now = state.clock.now();
    let submission = validate_submission(&body, &state.season, now)?;
    let outcome = reserve_slot(&state.store, &submission, &state.season, now).await?;
    Ok(match &outcome {
        ReservationOutcome::Booked(_) => HttpResponse::Created().json(json!({
            "success": true,
            "message": outcome.message(),
            "booking": outcome,
        })),
        ReservationOutcome::AlreadyBooked(existing) => HttpResponse::Conflict().json(json!({
            "success": false,
            "error": outcome.message(),
            "booking": existing,
        })),
    })
}

// Admin API

async fn admin_login<S: BookingStore>(
    body: web::Json<LoginRequest>,
    session: Session,
    state: State<S>,
) -> Result<HttpResponse, AppError> {
    let user = sign_in(&session, &state.admin, &body)?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "email": user.email})))
}

async fn admin_logout(session: Session) -> HttpResponse {
    sign_out(&session);
    HttpResponse::Ok().json(json!({"success": true}))
}

async fn dashboard<S: BookingStore>(_admin: AdminUser, state: State<S>) -> Result<HttpResponse, AppError> {
    let bookings = state
        .store
        .bookings_with_players()
        .await
        .map_err(AppError::store(FETCH_FAILED))?;
    let stats = compute_stats(&bookings, state.clock.now(), &state.season);
    Ok(HttpResponse::Ok().json(json!({"success": true, "stats": stats})))
}

async fn week_days<S: BookingStore>(
    _admin: AdminUser,
    start: web::Path<String>,
    state: State<S>,
) -> Result<HttpResponse, AppError> {
    let date = parse_date(&start).ok_or_else(|| bad_date(&start))?;
    let (start, end) = (week_start(date), week_end(week_start(date)));
    let bookings = state
        .store
        .bookings_between(start, end)
        .await
        .map_err(AppError::store(FETCH_FAILED))?;
    let days: Vec<DayOverview> = day_summaries(start, &bookings)
        .into_iter()
        .map(|day| DayOverview {
            date: day.date,
            label: format_long_date(day.date),
            booked: day.booked,
            badge: day_badge(day.booked),
        })
        .collect();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "start": start,
        "end": end,
        "label": format_week_range(start, end),
        "days": days,
    })))
}

async fn day_times<S: BookingStore>(
    _admin: AdminUser,
    date: web::Path<String>,
    state: State<S>,
) -> Result<HttpResponse, AppError> {
    let day = parse_date(&date).ok_or_else(|| bad_date(&date))?;
    let mut bookings: Vec<BookingWithPlayers> = state
        .store
        .bookings_with_players()
        .await
        .map_err(AppError::store(FETCH_FAILED))?
        .into_iter()
        .filter(|b| b.booking.date == day)
        .collect();
    bookings.iter_mut().for_each(BookingWithPlayers::sort_players_by_team);

    let times: Vec<TimeRow> = time_listing(day, &bookings)
        .into_iter()
        .map(|entry| TimeRow {
            time: entry.time,
            label: format_time_12h(entry.time),
            booking: entry.booking,
        })
        .collect();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "date": day,
        "label": format_long_date(day),
        "times": times,
    })))
}

async fn list_bookings<S: BookingStore>(_admin: AdminUser, state: State<S>) -> Result<HttpResponse, AppError> {
    let now = state.clock.now();
    let bookings = state
        .store
        .bookings_with_players()
        .await
        .map_err(AppError::store(FETCH_FAILED))?;
    let sessions: Vec<BookedSession> = bookings
        .iter()
        .map(|booking| BookedSession {
            booking,
            state: session_state(booking, now),
            date_label: format_long_date(booking.booking.date),
            time_label: format_time_12h(booking.booking.time),
        })
        .collect();
    Ok(HttpResponse::Ok().json(json!({"success": true, "bookings": sessions})))
}

async fn get_booking<S: BookingStore>(
    _admin: AdminUser,
    id: web::Path<i64>,
    state: State<S>,
) -> Result<HttpResponse, AppError> {
    let details = booking_details(&state.store, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "booking": details})))
}

async fn update_booking<S: BookingStore>(
    _admin: AdminUser,
    id: web::Path<i64>,
    body: web::Json<BookingEditRequest>,
    state: State<S>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let edit = BookingEdit::parse(body.into_inner())?;
    edit_booking(&state.store, id, &edit).await?;
    let details = booking_details(&state.store, id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": UPDATED_MESSAGE,
        "booking": details,
    })))
}

async fn delete_bookings<S: BookingStore>(admin: AdminUser, state: State<S>) -> Result<HttpResponse, AppError> {
    let deleted = delete_all_bookings(&state.store).await?;
    info!(admin = %admin.email, deleted, "bookings cleared");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": DELETED_MESSAGE,
        "deleted": deleted,
    })))
}

// HTML pages

async fn index_page() -> HttpResponse {
    html(include_str!("../templates/index.html"))
}

async fn schedule_page() -> HttpResponse {
    html(include_str!("../templates/schedule.html"))
}

async fn admin_page() -> HttpResponse {
    html(include_str!("../templates/admin.html"))
}

async fn dashboard_page(admin: Option<AdminUser>) -> HttpResponse {
    match admin {
        Some(_) => html(include_str!("../templates/dashboard.html")),
        None => HttpResponse::Found()
            .insert_header((header::LOCATION, "/admin"))
            .finish(),
    }
}

fn html(body: &'static str) -> HttpResponse {
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body)
}

/// Registers every page and API route for a store type.
pub fn configure<S: BookingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| AppError::BadRequest(err.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|err, _| AppError::BadRequest(err.to_string()).into()))
        .app_data(web::PathConfig::default().error_handler(|err, _| AppError::BadRequest(err.to_string()).into()))
        .route("/", web::get().to(index_page))
        .route("/schedule", web::get().to(schedule_page))
        .route("/admin", web::get().to(admin_page))
        .route("/admin/dashboard", web::get().to(dashboard_page))
        .service(
            web::scope("/api")
                .route("/schedule", web::get().to(get_schedule::<S>))
                .route("/roster/check", web::post().to(check_roster))
                .route("/bookings", web::post().to(create_booking::<S>))
                .service(
                    web::scope("/admin")
                        .route("/login", web::post().to(admin_login::<S>))
                        .route("/logout", web::post().to(admin_logout))
                        .route("/dashboard", web::get().to(dashboard::<S>))
                        .route("/weeks/{start}", web::get().to(week_days::<S>))
                        .route("/days/{date}", web::get().to(day_times::<S>))
                        .service(
                            web::resource("/bookings")
                                .route(web::get().to(list_bookings::<S>))
                                .route(web::delete().to(delete_bookings::<S>)),
                        )
                        .service(
                            web::resource("/bookings/{id}")
                                .route(web::get().to(get_booking::<S>))
                                .route(web::put().to(update_booking::<S>)),
                        ),
                ),
        );
}

pub async fn start_server<S: BookingStore + 'static>(config: Config, store: S) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(store, config.season, Clock::System, config.admin.clone()));
    let key = config.session_key.clone();
    let secure = config.environment.is_production();

    info!(port = config.port, secure_cookies = secure, "starting web server");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(session_middleware(key.clone(), secure))
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "static"))
            .configure(configure::<S>)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
