//! The visitor's week view: local booking cache, open dialog, unsaved drafts,
//! and the background refresh that keeps the cache converging on the store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::form::{validate_submission, ReservationRequest, RosterForm};
use crate::models::{Booking, SlotKey};
use crate::reservation::{reserve_slot, ReservationOutcome};
use crate::schedule::{slot_status, slots_for_week, DaySlots, Season, SlotStatus, WeekCursor};
use crate::store::BookingStore;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const CLOCK_INTERVAL: Duration = Duration::from_secs(60);
/// How long the confirmation stays up before the dialog closes itself.
pub const CONFIRMATION_DELAY: Duration = Duration::from_secs(2);
/// How often the poller checks for a confirmation to close.
pub const DIALOG_CHECK_INTERVAL: Duration = Duration::from_millis(250);
pub const FETCH_FAILED: &str = "Failed to fetch bookings. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogPhase {
    FormOpen,
    Submitting,
    /// Booked; closes on the first tick at or after `closes_at`.
    Success { closes_at: Instant },
    /// The store failed; the form stays filled in for a retry.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub slot: SlotKey,
    pub phase: DialogPhase,
}

/// What a submit attempt did, as seen by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Booked(Booking),
    AlreadyBooked(Booking),
    Blocked(String),
    Failed(String),
}

#[derive(Debug)]
pub struct ScheduleView {
    season: Season,
    cursor: WeekCursor,
    now: NaiveDateTime,
    bookings: BTreeMap<SlotKey, Booking>,
    dialog: Option<Dialog>,
    drafts: HashMap<SlotKey, RosterForm>,
    error: Option<String>,
}

impl ScheduleView {
    pub fn new(season: Season, now: NaiveDateTime) -> Self {
        Self {
            season,
            cursor: WeekCursor::initial(now.date(), &season),
            now,
            bookings: BTreeMap::new(),
            dialog: None,
            drafts: HashMap::new(),
            error: None,
        }
    }

    pub fn cursor(&self) -> WeekCursor {
        self.cursor
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn set_now(&mut self, now: NaiveDateTime) {
        self.now = now;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    /// Polling pauses while a dialog is open so a refresh can't wipe the form.
    pub fn polling_paused(&self) -> bool {
        self.dialog.is_some()
    }

    pub fn next_week(&mut self) -> bool {
        match self.cursor.next(&self.season) {
            Some(next) => {
                self.cursor = next;
                true
            }
            None => false,
        }
    }

    pub fn previous_week(&mut self) -> bool {
        match self.cursor.previous(self.now.date()) {
            Some(previous) => {
                self.cursor = previous;
                true
            }
            None => false,
        }
    }

    pub fn status(&self, slot: SlotKey) -> SlotStatus {
        if !self.season.contains(slot.date) {
            return SlotStatus::Unavailable;
        }
        let cached: Vec<SlotKey> = self.bookings.keys().copied().collect();
        slot_status(slot.date, slot.time, &cached, self.now)
    }

    pub fn grid(&self) -> Vec<DaySlots> {
        let cached: Vec<SlotKey> = self.bookings.keys().copied().collect();
        slots_for_week(self.cursor.anchor(), &cached, self.now, &self.season)
    }

    /// Replaces the cache with a fresh snapshot of the visible week.
    ///
    /// Drafts belong to the snapshot they were typed against and are dropped,
    /// except the one behind the open dialog.
    pub fn reconcile(&mut self, snapshot: Vec<Booking>) {
        self.bookings = snapshot.into_iter().map(|b| (b.slot(), b)).collect();
        let open = self.dialog.as_ref().map(|d| d.slot);
        self.drafts.retain(|slot, _| Some(*slot) == open);
        self.error = None;
    }

    /// Adds a booking unless its slot is already cached.
    pub fn merge_booking(&mut self, booking: Booking) -> bool {
        let slot = booking.slot();
        if self.bookings.contains_key(&slot) {
            return false;
        }
        self.bookings.insert(slot, booking);
        true
    }

    /// Opens the dialog of an available slot, restoring any unsaved draft.
    pub fn open_dialog(&mut self, slot: SlotKey) -> bool {
        if self.dialog.is_some() || !self.status(slot).is_bookable() {
            return false;
        }
        self.drafts.entry(slot).or_default();
        self.dialog = Some(Dialog {
            slot,
            phase: DialogPhase::FormOpen,
        });
        true
    }

    /// The form of the open dialog.
    pub fn form_mut(&mut self) -> Option<&mut RosterForm> {
        let dialog = self.dialog.as_ref()?;
        if dialog.phase != DialogPhase::FormOpen {
            return None;
        }
        self.drafts.get_mut(&dialog.slot)
    }

    pub fn form(&self) -> Option<&RosterForm> {
        self.dialog.as_ref().and_then(|d| self.drafts.get(&d.slot))
    }

    /// Closes the dialog. The draft stays until the next reconcile.
    pub fn close_dialog(&mut self) {
        if let Some(dialog) = self.dialog.take() {
            debug!(slot = ?dialog.slot, "dialog closed");
        }
    }

    /// Closes a confirmed dialog once its delay ran out.
    pub fn tick(&mut self, at: Instant) {
        let expired = matches!(
            &self.dialog,
            Some(Dialog { phase: DialogPhase::Success { closes_at }, .. }) if at >= *closes_at
        );
        if expired {
            self.close_dialog();
        }
    }

    /// Takes the form out for submission, or explains why it can't be sent.
    fn begin_submit(&mut self) -> Result<(SlotKey, RosterForm), String> {
        let Some(dialog) = self.dialog.as_mut() else {
            return Err("No booking dialog is open".to_string());
        };
        if dialog.phase != DialogPhase::FormOpen {
            return Err("The booking is already being submitted".to_string());
        }
        let Some(form) = self.drafts.get(&dialog.slot).cloned() else {
            return Err("The booking form was lost, please reopen the slot".to_string());
        };
        if let Some(duplicate) = form.duplicate_error() {
            return Err(duplicate.to_string());
        }
        dialog.phase = DialogPhase::Submitting;
        Ok((dialog.slot, form))
    }

    fn finish_submit(&mut self, slot: SlotKey, result: &Result<ReservationOutcome, AppError>) -> SubmitResult {
        match result {
            Ok(ReservationOutcome::Booked(saved)) => {
                self.merge_booking(saved.booking.clone());
                self.drafts.remove(&slot);
                self.set_phase(DialogPhase::Success {
                    closes_at: Instant::now() + CONFIRMATION_DELAY,
                });
                SubmitResult::Booked(saved.booking.clone())
            }
            Ok(ReservationOutcome::AlreadyBooked(existing)) => {
                self.merge_booking(existing.clone());
                self.drafts.remove(&slot);
                self.close_dialog();
                SubmitResult::AlreadyBooked(existing.clone())
            }
            Err(e) if e.is_validation() => {
                self.set_phase(DialogPhase::FormOpen);
                SubmitResult::Blocked(e.to_string())
            }
            Err(e) => {
                self.set_phase(DialogPhase::Failed { error: e.to_string() });
                SubmitResult::Failed(e.to_string())
            }
        }
    }

    fn set_phase(&mut self, phase: DialogPhase) {
        if let Some(dialog) = self.dialog.as_mut() {
            dialog.phase = phase;
        }
    }

    /// Lets a failed dialog be edited and sent again.
    pub fn retry(&mut self) {
        let failed = matches!(
            &self.dialog,
            Some(Dialog { phase: DialogPhase::Failed { .. }, .. })
        );
        if failed {
            self.set_phase(DialogPhase::FormOpen);
        }
    }
}

/// Submits the open dialog's roster. The view is locked only around the
/// state changes, never across the store round trip.
pub async fn submit<S: BookingStore>(view: &Mutex<ScheduleView>, store: &S, clock: &Clock) -> SubmitResult {
    let (slot, form, season) = {
        let mut view = lock(view);
        match view.begin_submit() {
            Ok((slot, form)) => (slot, form, view.season),
            Err(reason) => return SubmitResult::Blocked(reason),
        }
    };

    let request = ReservationRequest {
        date: slot.date.format("%Y-%m-%d").to_string(),
        time: slot.time.format("%H:%M:%S").to_string(),
        team_a: form.team_a().to_vec(),
        team_b: form.team_b().to_vec(),
    };
    let now = clock.now();
    let result = match validate_submission(&request, &season, now) {
        Ok(submission) => reserve_slot(store, &submission, &season, now).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        warn!(error = %e, "booking attempt failed");
    }

    lock(view).finish_submit(slot, &result)
}

/// Fetches the visible week and replaces the cache. Skipped while a dialog is
/// open unless `force` is set.
pub async fn refresh<S: BookingStore>(view: &Mutex<ScheduleView>, store: &S, force: bool) -> bool {
    let (start, end) = {
        let view = lock(view);
        if view.polling_paused() && !force {
            return false;
        }
        (view.cursor.start(), view.cursor.end())
    };

    match store.bookings_between(start, end).await {
        Ok(snapshot) => {
            let mut view = lock(view);
            // a dialog opened while we were fetching; keep its form intact
            if view.polling_paused() && !force {
                return false;
            }
            if view.cursor.start() != start {
                return false;
            }
            debug!(%start, bookings = snapshot.len(), "schedule refreshed");
            view.reconcile(snapshot);
            true
        }
        Err(e) => {
            error!(error = %e, "Error fetching bookings");
            lock(view).error = Some(FETCH_FAILED.to_string());
            false
        }
    }
}

fn lock(view: &Mutex<ScheduleView>) -> std::sync::MutexGuard<'_, ScheduleView> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}

/// Background refresh of a [`ScheduleView`]: bookings every 30 seconds, the
/// wall clock every 60, confirmation dialogs closed once their delay is up.
/// Stops when dropped.
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<S>(view: Arc<Mutex<ScheduleView>>, store: Arc<S>, clock: Clock) -> Self
    where
        S: BookingStore + 'static,
    {
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut bookings = interval_at(start + POLL_INTERVAL, POLL_INTERVAL);
            let mut wall_clock = interval_at(start + CLOCK_INTERVAL, CLOCK_INTERVAL);
            let mut dialog = interval_at(start + DIALOG_CHECK_INTERVAL, DIALOG_CHECK_INTERVAL);
            bookings.set_missed_tick_behavior(MissedTickBehavior::Delay);
            wall_clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
            dialog.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("schedule polling started");

            loop {
                tokio::select! {
                    _ = bookings.tick() => {
                        lock(&view).tick(Instant::now());
                        refresh(&view, store.as_ref(), false).await;
                    }
                    _ = wall_clock.tick() => {
                        lock(&view).set_now(clock.now());
                    }
                    _ = dialog.tick() => {
                        lock(&view).tick(Instant::now());
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Team;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 16)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn slot(day: u32, hour: u32) -> SlotKey {
        SlotKey {
            date: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        }
    }

    fn view() -> Mutex<ScheduleView> {
        Mutex::new(ScheduleView::new(Season::default(), now()))
    }

    fn fill(form: &mut RosterForm) {
        for (i, name) in ["Ana", "Bea", "Cai", "Dov", "Eli"].iter().enumerate() {
            form.set_name(Team::A, i, *name);
        }
        for (i, name) in ["Fay", "Gus", "Hal", "Ivy", "Jon"].iter().enumerate() {
            form.set_name(Team::B, i, *name);
        }
    }

    #[tokio::test]
    async fn end_to_end_booking_flips_the_slot() {
        let store = MemoryStore::new();
        let view = view();
        let clock = Clock::Fixed(now());
        let target = slot(17, 10);

        {
            let mut v = view.lock().unwrap();
            assert_eq!(v.status(target), SlotStatus::Available);
            assert!(v.open_dialog(target));
            assert!(v.polling_paused());
            fill(v.form_mut().unwrap());
        }

        let result = submit(&view, &store, &clock).await;
        assert!(matches!(result, SubmitResult::Booked(_)));

        let all = store.bookings_with_players().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].players.len(), 10);

        let mut v = view.lock().unwrap();
        assert_eq!(v.status(target), SlotStatus::Booked);
        assert!(matches!(
            v.dialog().unwrap().phase,
            DialogPhase::Success { .. }
        ));
        v.tick(Instant::now() + CONFIRMATION_DELAY);
        assert!(v.dialog().is_none());
    }

    #[tokio::test]
    async fn duplicate_names_block_submission() {
        let store = MemoryStore::new();
        let view = view();
        {
            let mut v = view.lock().unwrap();
            v.open_dialog(slot(17, 10));
            let form = v.form_mut().unwrap();
            form.set_name(Team::A, 0, "Sam");
            form.set_name(Team::B, 0, "sam");
        }
        let result = submit(&view, &store, &Clock::Fixed(now())).await;
        assert_eq!(result, SubmitResult::Blocked("Duplicate player name: sam".to_string()));
        assert!(store.bookings_with_players().await.unwrap().is_empty());
        assert_eq!(view.lock().unwrap().dialog().unwrap().phase, DialogPhase::FormOpen);
    }

    #[tokio::test]
    async fn taken_slot_closes_the_dialog_quietly() {
        let store = MemoryStore::new();
        let target = slot(17, 10);
        let rival = store.insert_booking(target.date, target.time).await.unwrap();
        let view = view();
        {
            let mut v = view.lock().unwrap();
            v.open_dialog(target);
            fill(v.form_mut().unwrap());
        }
        let result = submit(&view, &store, &Clock::Fixed(now())).await;
        assert_eq!(result, SubmitResult::AlreadyBooked(rival));
        let v = view.lock().unwrap();
        assert!(v.dialog().is_none());
        assert_eq!(v.status(target), SlotStatus::Booked);
    }

    #[test]
    fn drafts_survive_closing_until_reconcile() {
        let mut v = ScheduleView::new(Season::default(), now());
        let target = slot(17, 10);
        v.open_dialog(target);
        v.form_mut().unwrap().set_name(Team::A, 0, "Sam");
        v.close_dialog();

        assert!(v.open_dialog(target));
        assert_eq!(v.form().unwrap().name(Team::A, 0), Some("Sam"));
        v.close_dialog();

        v.reconcile(Vec::new());
        v.open_dialog(target);
        assert_eq!(v.form().unwrap().name(Team::A, 0), Some(""));
    }

    #[test]
    fn only_available_slots_open() {
        let mut v = ScheduleView::new(Season::default(), now());
        assert!(!v.open_dialog(slot(16, 8))); // already started
        v.merge_booking(Booking {
            id: 1,
            date: slot(17, 10).date,
            time: slot(17, 10).time,
        });
        assert!(!v.open_dialog(slot(17, 10)));
        assert!(v.open_dialog(slot(17, 11)));
        assert!(!v.open_dialog(slot(17, 12))); // one dialog at a time
    }

    #[test]
    fn merge_is_idempotent_and_reconcile_replaces() {
        let mut v = ScheduleView::new(Season::default(), now());
        let key = slot(17, 10);
        let booking = Booking {
            id: 1,
            date: key.date,
            time: key.time,
        };
        assert!(v.merge_booking(booking.clone()));
        assert!(!v.merge_booking(Booking { id: 2, ..booking.clone() }));
        assert_eq!(v.bookings().count(), 1);

        v.reconcile(Vec::new());
        assert_eq!(v.bookings().count(), 0);
        assert_eq!(v.status(key), SlotStatus::Available);
    }

    #[test]
    fn week_navigation_is_bounded() {
        let mut v = ScheduleView::new(Season::default(), now());
        assert!(!v.previous_week());
        assert!(v.next_week());
        assert_eq!(v.cursor().start(), slot(23, 8).date);
        assert!(v.previous_week());
        assert!(!v.previous_week());
    }

    #[tokio::test]
    async fn forced_refresh_keeps_the_open_form() {
        let store = MemoryStore::new();
        let view = view();
        let target = slot(17, 10);
        {
            let mut v = view.lock().unwrap();
            v.open_dialog(target);
            let form = v.form_mut().unwrap();
            form.set_name(Team::A, 0, "Sam");
            form.set_name(Team::B, 0, "Joe");
        }

        assert!(refresh(&view, &store, true).await);
        assert_eq!(
            view.lock().unwrap().form().unwrap().name(Team::A, 0),
            Some("Sam")
        );

        let result = submit(&view, &store, &Clock::Fixed(now())).await;
        assert!(matches!(result, SubmitResult::Booked(_)));
        let all = store.bookings_with_players().await.unwrap();
        let names: Vec<&str> = all[0].players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Sam", "Joe"]);
    }

    #[test]
    fn reconcile_drops_only_closed_drafts() {
        let mut v = ScheduleView::new(Season::default(), now());
        v.open_dialog(slot(17, 10));
        v.form_mut().unwrap().set_name(Team::A, 0, "Sam");
        v.close_dialog();
        v.open_dialog(slot(17, 11));
        v.form_mut().unwrap().set_name(Team::A, 0, "Ada");

        v.reconcile(Vec::new());
        assert_eq!(v.form().unwrap().name(Team::A, 0), Some("Ada"));
        v.close_dialog();
        v.open_dialog(slot(17, 10));
        assert_eq!(v.form().unwrap().name(Team::A, 0), Some(""));
    }

    #[tokio::test]
    async fn refresh_waits_for_the_dialog() {
        let store = MemoryStore::new();
        let view = view();
        view.lock().unwrap().open_dialog(slot(17, 10));
        store.insert_booking(slot(18, 10).date, slot(18, 10).time).await.unwrap();

        assert!(!refresh(&view, &store, false).await);
        assert_eq!(view.lock().unwrap().bookings().count(), 0);

        view.lock().unwrap().close_dialog();
        assert!(refresh(&view, &store, false).await);
        assert_eq!(view.lock().unwrap().bookings().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_refreshes_and_ticks_the_clock() {
        let store = Arc::new(MemoryStore::new());
        let view = Arc::new(view());
        let later = now() + chrono::Duration::hours(3);
        let _poller = Poller::spawn(view.clone(), store.clone(), Clock::Fixed(later));

        store.insert_booking(slot(18, 10).date, slot(18, 10).time).await.unwrap();
        tokio::time::sleep(POLL_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(view.lock().unwrap().bookings().count(), 1);
        assert_eq!(view.lock().unwrap().now(), now());

        tokio::time::sleep(CLOCK_INTERVAL).await;
        assert_eq!(view.lock().unwrap().now(), later);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_closes_after_two_seconds() {
        let store = Arc::new(MemoryStore::new());
        let view = Arc::new(view());
        let clock = Clock::Fixed(now());
        let _poller = Poller::spawn(view.clone(), store.clone(), clock);
        {
            let mut v = view.lock().unwrap();
            v.open_dialog(slot(17, 10));
            fill(v.form_mut().unwrap());
        }

        let result = submit(&view, store.as_ref(), &clock).await;
        assert!(matches!(result, SubmitResult::Booked(_)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(
            view.lock().unwrap().dialog().map(|d| d.phase.clone()),
            Some(DialogPhase::Success { .. })
        ));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(view.lock().unwrap().dialog().is_none());
        assert!(!view.lock().unwrap().polling_paused());
    }
}
