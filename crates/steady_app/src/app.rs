use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use steady_core::{
    clock::{Clock, SystemClock},
    rollover::DayRollover,
    state::Theme,
    stats::{CalendarDay, ConsistencySummary},
    store::{self, FileStore, DEFAULT_STORAGE_KEY},
    DateKey, Task, TrackerService,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) storage_key: String,
    pub(crate) log_filter: String,
    pub(crate) resident: bool,
    pub(crate) ignored: Vec<&'static str>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("STEADY_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(key) = std::env::var("STEADY_STORAGE_KEY") {
            let key = key.trim();
            match store::validate_key(key) {
                Ok(()) => config.storage_key = key.to_string(),
                Err(_) => config.ignored.push("STEADY_STORAGE_KEY"),
            }
        }
        if let Ok(filter) = std::env::var("STEADY_LOG") {
            if !filter.trim().is_empty() {
                config.log_filter = filter.trim().to_string();
            }
        }
        if let Ok(flag) = std::env::var("STEADY_RESIDENT") {
            match parse_flag(&flag) {
                Some(resident) => config.resident = resident,
                None => config.ignored.push("STEADY_RESIDENT"),
            }
        }
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Variables that were set but held an unusable value.
    pub fn ignored(&self) -> &[&'static str] {
        &self.ignored
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|dir| dir.join("steady"))
            .unwrap_or_else(|| PathBuf::from(".steady"));
        Self {
            data_dir,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_filter: "info".to_string(),
            resident: false,
            ignored: Vec::new(),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskView {
    pub id: String,
    pub text: String,
    pub checked: bool,
    pub committed: bool,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id().to_string(),
            text: task.text().to_string(),
            checked: task.is_completed(),
            committed: task.completed_at().is_some(),
        }
    }
}

/// Everything a view layer renders for the current day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardView {
    pub today: DateKey,
    pub title: String,
    pub app_title: String,
    pub theme: Theme,
    pub daily_message: String,
    pub tasks: Vec<TaskView>,
    pub summary: ConsistencySummary,
    pub calendar: Vec<CalendarDay>,
}

impl DashboardView {
    pub fn derive(service: &TrackerService) -> Self {
        let summary = service.summary();
        let today = summary.today;
        Self {
            today,
            title: service.title(),
            app_title: service.app_title(),
            theme: service.theme(),
            daily_message: service.daily_message().to_string(),
            tasks: service.tasks_for_day(today).iter().map(TaskView::from).collect(),
            summary,
            calendar: service.year_calendar(summary.year),
        }
    }
}

pub struct AppController {
    service: Arc<TrackerService>,
    config: AppConfig,
    dashboard: Arc<RwLock<Option<DashboardView>>>,
    rollover: Option<DayRollover>,
}

impl AppController {
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        info!(data_dir = %config.data_dir.display(), key = %config.storage_key, "initializing controller");
        let file_store = FileStore::open(&config.data_dir).with_context(|| {
            format!("failed to open data directory {}", config.data_dir.display())
        })?;
        let service = TrackerService::builder()
            .with_store(file_store)
            .with_storage_key(config.storage_key.clone())
            .with_clock(clock)
            .build()
            .context("failed to initialize tracker service")?;
        Ok(Self {
            service: Arc::new(service),
            config,
            dashboard: Arc::new(RwLock::new(None)),
            rollover: None,
        })
    }

    /// Derives the first dashboard and arms the midnight timer. Calling it again
    /// replaces the previous timer.
    pub fn initialize(&mut self) -> Result<DashboardView> {
        let view = self.refresh();
        if let Some(previous) = self.rollover.take() {
            debug!("replacing existing rollover timer");
            previous.stop();
        }
        let service = Arc::clone(&self.service);
        let dashboard = Arc::clone(&self.dashboard);
        let timer = DayRollover::start(self.service.clock(), move |day| {
            let view = DashboardView::derive(&service);
            info!(day = %day, tasks = view.tasks.len(), "dashboard rolled over");
            *dashboard.write() = Some(view);
        })
        .context("failed to start day rollover timer")?;
        self.rollover = Some(timer);
        Ok(view)
    }

    pub fn refresh(&self) -> DashboardView {
        let view = DashboardView::derive(&self.service);
        *self.dashboard.write() = Some(view.clone());
        view
    }

    pub fn dashboard(&self) -> Option<DashboardView> {
        self.dashboard.read().clone()
    }

    pub fn service(&self) -> &TrackerService {
        &self.service
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn trigger_rollover(&self) {
        match &self.rollover {
            Some(timer) => timer.trigger(),
            None => warn!("rollover requested before initialize"),
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(timer) = self.rollover.take() {
            timer.stop();
        }
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    for var in config.ignored() {
        warn!(var, "ignoring invalid environment value");
    }
    let resident = config.resident;
    let mut controller = AppController::new(config)?;
    let view = controller.initialize()?;
    log_dashboard(&view);

    if resident {
        info!("staying resident until stdin closes");
        let mut line = String::new();
        while std::io::stdin().read_line(&mut line).context("failed to read stdin")? > 0 {
            line.clear();
            log_dashboard(&controller.refresh());
        }
    }
    controller.shutdown();
    Ok(())
}

fn log_dashboard(view: &DashboardView) {
    let done_today = view.tasks.iter().filter(|task| task.checked).count();
    info!(
        today = %view.today,
        title = %view.title,
        tasks = view.tasks.len(),
        done_today,
        current_streak = view.summary.current_streak,
        longest_streak = view.summary.longest_streak,
        days_consistent = view.summary.days_consistent,
        daily = %view.daily_message,
        "dashboard"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::{Duration, Instant};
    use steady_core::clock::FixedClock;

    fn controller_on(dir: &std::path::Path, date: NaiveDate) -> (AppController, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::on(date));
        let config = AppConfig::default().with_data_dir(dir);
        let controller = AppController::with_clock(config, clock.clone()).expect("controller");
        (controller, clock)
    }

    fn wait_for_day(controller: &AppController, day: &str) -> DashboardView {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(view) = controller.dashboard() {
                if view.today.to_string() == day {
                    return view;
                }
            }
            assert!(Instant::now() < deadline, "dashboard never reached {day}");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn flags_parse_leniently() {
        assert_eq!(parse_flag(" YES "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn invalid_values_are_ignored() {
        std::env::set_var("STEADY_STORAGE_KEY", "../elsewhere");
        std::env::set_var("STEADY_RESIDENT", "sometimes");
        let config = AppConfig::from_env();
        std::env::remove_var("STEADY_STORAGE_KEY");
        std::env::remove_var("STEADY_RESIDENT");

        let config = config.expect("invalid values are not fatal");
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert!(!config.resident);
        assert_eq!(config.ignored(), ["STEADY_STORAGE_KEY", "STEADY_RESIDENT"]);
    }

    #[test]
    fn default_config_uses_standard_key() {
        let config = AppConfig::default();
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.log_filter(), "info");
        assert!(!config.resident);
        assert!(config.data_dir.ends_with("steady") || config.data_dir.ends_with(".steady"));
    }

    #[test]
    fn dashboard_shows_only_todays_tasks() {
        let temp = tempfile::tempdir().unwrap();
        let (controller, clock) = controller_on(temp.path(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        let service = controller.service();
        let old = service.create_task("Yesterday's").unwrap().unwrap();
        service.toggle_checked(old.id(), service.today()).unwrap();
        service.finalize_day().unwrap();

        clock.set_day(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
        service.create_task("Fresh").unwrap();
        let view = controller.refresh();
        assert_eq!(view.tasks.len(), 1);
        assert_eq!(view.tasks[0].text, "Fresh");
        assert!(!view.tasks[0].checked);
        assert_eq!(view.summary.days_consistent, 1);
        assert_eq!(view.summary.current_streak, 0);
        assert_eq!(view.calendar.len(), 366);
        assert!(!view.daily_message.is_empty());
    }

    #[test]
    fn rollover_rederives_the_dashboard() {
        let temp = tempfile::tempdir().unwrap();
        let (mut controller, clock) =
            controller_on(temp.path(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        let first = controller.initialize().unwrap();
        assert_eq!(first.today.to_string(), "2024-04-01");

        clock.set_day(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
        controller.trigger_rollover();
        let rolled = wait_for_day(&controller, "2024-04-02");
        assert_eq!(rolled.summary.today.to_string(), "2024-04-02");

        controller.initialize().unwrap();
        clock.set_day(NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        controller.trigger_rollover();
        wait_for_day(&controller, "2024-04-03");
        controller.shutdown();
    }
}
