mod desktop;
mod error;
mod progress;
mod state;
mod worker;

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use engine::{default_settings_path, load_settings, save_settings, Settings as AppSettings, Theme as AppTheme};
use iced::widget::{
    button, checkbox, column, container, horizontal_rule, row, scrollable, text, text_input,
};
use iced::{executor, Alignment, Application, Command, Element, Length, Settings, Subscription, Theme};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use error::GuiError;
use progress::ProgressUpdate;
use state::{AppState, PathField};

pub fn main() -> iced::Result {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    GuiApp::run(Settings::default())
}

#[derive(Debug, Clone)]
pub enum Message {
    FolderNameChanged(String),
    UseDateToggled(bool),
    ExtractToggled(bool),
    FileToggled(usize, bool),
    SelectAllToggled(bool),
    RefreshPressed,
    PathChanged(PathField, String),
    BrowsePressed(PathField),
    SavePathsPressed,
    ThemeTogglePressed,
    CreateFolderPressed,
    ClipboardRead(Option<String>),
    Tick,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub message: String,
    pub destination_dir: String,
    pub total_files: usize,
    pub processed_count: usize,
    pub failed_items: Vec<(String, String)>,
}

pub struct GuiApp {
    state: AppState,
    progress_rx: Option<Receiver<ProgressUpdate>>,
}

impl GuiApp {
    fn save_settings(&mut self) {
        if let Err(e) = save_settings(&self.state.settings_path, &self.state.settings) {
            warn!(error = %e, "saving settings failed");
            self.state.error_message = Some(GuiError::SettingsSave(e).to_string());
        }
    }

    fn start_run(&mut self) {
        let request = match self.state.build_request() {
            Ok(request) => request,
            Err(e) => {
                self.state.error_message = Some(e.to_string());
                return;
            }
        };

        info!(
            destination = %request.destination_dir.display(),
            files = request.selected_files.len(),
            "starting run"
        );
        self.state.start_run(request.selected_files.len());

        let (tx, rx) = unbounded::<ProgressUpdate>();
        self.progress_rx = Some(rx);
        worker::spawn_run(request, tx);
    }

    fn drain_progress(&mut self) {
        let Some(rx) = &self.progress_rx else {
            return;
        };

        let updates: Vec<ProgressUpdate> = rx.try_iter().collect();
        let mut finished = false;
        let mut open_target = None;
        for update in updates {
            if let ProgressUpdate::RunFinished(outcome) = &update {
                finished = true;
                open_target = outcome.as_ref().ok().map(|s| s.destination_dir.clone());
            }
            self.state.handle_progress_update(update);
        }

        if finished {
            self.progress_rx = None;
        }
        if let Some(folder) = open_target {
            if let Err(e) = desktop::open_folder(Path::new(&folder)) {
                warn!(error = %e, "opening destination folder failed");
                self.state.error_message = Some(e.to_string());
            }
        }
    }

    fn file_table(&self) -> Element<Message> {
        if self.state.files.is_empty() {
            let note = if self.state.settings.source_dir.as_os_str().is_empty() {
                "Set a source directory under Edit Paths".to_string()
            } else {
                format!("No files in {}", self.state.settings.source_dir.display())
            };
            return text(note).into();
        }

        let header = row![
            checkbox("", self.state.all_selected()).on_toggle(Message::SelectAllToggled),
            text("File Name").width(Length::FillPortion(4)),
            text("Date Modified").width(Length::FillPortion(2)),
            text("Size").width(Length::FillPortion(1)),
            text("Type").width(Length::FillPortion(1)),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let mut rows = column![].spacing(4);
        for (index, file) in self.state.files.iter().enumerate() {
            rows = rows.push(
                row![
                    checkbox("", file.selected)
                        .on_toggle(move |checked| Message::FileToggled(index, checked)),
                    text(&file.entry.name).width(Length::FillPortion(4)),
                    text(file.entry.display_modified()).width(Length::FillPortion(2)),
                    text(file.entry.display_size()).width(Length::FillPortion(1)),
                    text(&file.entry.extension).width(Length::FillPortion(1)),
                ]
                .spacing(10)
                .align_items(Alignment::Center),
            );
        }

        column![header, horizontal_rule(1), scrollable(rows).height(Length::Fill)]
            .spacing(6)
            .height(Length::FillPortion(3))
            .into()
    }

    fn path_row(&self, field: PathField) -> Element<Message> {
        let value = match field {
            PathField::Source => &self.state.source_input,
            PathField::Output => &self.state.output_input,
            PathField::Processed => &self.state.processed_input,
        };

        row![
            text(format!("{} Directory", field.label())).width(Length::Fixed(150.0)),
            text_input("Enter path", value)
                .on_input(move |path| Message::PathChanged(field, path))
                .width(Length::Fill),
            button("Browse...").on_press(Message::BrowsePressed(field)),
        ]
        .spacing(10)
        .align_items(Alignment::Center)
        .into()
    }

    fn status_section(&self) -> Element<Message> {
        if self.state.is_running {
            let current = match (&self.state.current_stage, self.state.current_file_name.is_empty()) {
                (_, true) => text(""),
                (Some(stage), false) => {
                    text(format!("Current: {} ({})", self.state.current_file_name, stage))
                }
                (None, false) => text(format!("Current: {}", self.state.current_file_name)),
            };

            column![
                text(format!(
                    "{} / {} files",
                    self.state.completed_count, self.state.total_files
                )),
                text(format!("Failed: {}", self.state.failed_count)),
                current,
            ]
            .spacing(5)
            .into()
        } else if let Some(summary) = &self.state.last_run_summary {
            let mut col = column![
                text(format!(
                    "Run Complete ({}/{})",
                    summary.processed_count, summary.total_files
                )),
                text(&summary.message),
                text(format!("Folder: {}", summary.destination_dir)),
            ]
            .spacing(5);

            if !summary.failed_items.is_empty() {
                col = col.push(text("Failed Files (first 10):"));
                for (name, err) in summary.failed_items.iter().take(10) {
                    col = col.push(text(format!("  {}: {}", name, err)));
                }
            }

            col.into()
        } else {
            text("Select files, enter a folder name, and press Create Folder").into()
        }
    }
}

impl Application for GuiApp {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ();

    fn new(_flags: ()) -> (Self, Command<Message>) {
        let settings_path = default_settings_path();
        let (settings, load_error) = match load_settings(&settings_path) {
            Ok(settings) => (settings, None),
            Err(e) => {
                warn!(error = %e, "using default settings");
                (AppSettings::default(), Some(GuiError::SettingsLoad(e).to_string()))
            }
        };

        let mut state = AppState::new(settings_path, settings);
        state.error_message = load_error;

        (
            GuiApp {
                state,
                progress_rx: None,
            },
            iced::clipboard::read(Message::ClipboardRead),
        )
    }

    fn title(&self) -> String {
        "Intake - Ingest Files".to_string()
    }

    fn theme(&self) -> Theme {
        match self.state.settings.theme {
            AppTheme::Light => Theme::Light,
            AppTheme::Dark => Theme::Dark,
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.progress_rx.is_some() {
            iced::time::every(Duration::from_millis(100)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::FolderNameChanged(name) => {
                self.state.folder_name = name;
                self.state.error_message = None;
            }
            Message::UseDateToggled(enabled) => {
                self.state.use_date = enabled;
            }
            Message::ExtractToggled(enabled) => {
                self.state.extract = enabled;
            }
            Message::FileToggled(index, checked) => {
                if let Some(row) = self.state.files.get_mut(index) {
                    row.selected = checked;
                }
            }
            Message::SelectAllToggled(checked) => {
                self.state.set_all_selected(checked);
            }
            Message::RefreshPressed => {
                self.state.refresh_files();
            }
            Message::PathChanged(field, path) => {
                *self.state.path_input_mut(field) = path;
            }
            Message::BrowsePressed(field) => {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    *self.state.path_input_mut(field) = path.display().to_string();
                }
            }
            Message::SavePathsPressed => {
                self.state.apply_path_inputs();
                self.state.error_message = None;
                self.save_settings();
                self.state.refresh_files();
            }
            Message::ThemeTogglePressed => {
                self.state.settings.theme = self.state.settings.theme.toggled();
                self.save_settings();
            }
            Message::CreateFolderPressed => {
                if !self.state.is_running {
                    self.start_run();
                }
            }
            Message::ClipboardRead(contents) => {
                self.state.prefill_folder_name(contents.as_deref());
            }
            Message::Tick => {
                self.drain_progress();
            }
        }

        Command::none()
    }

    fn view(&self) -> Element<Message> {
        let toolbar = row![
            text("Intake").size(24).width(Length::Fill),
            button("Refresh").on_press(Message::RefreshPressed),
            button(match self.state.settings.theme {
                AppTheme::Light => "Dark Theme",
                AppTheme::Dark => "Light Theme",
            })
            .on_press(Message::ThemeTogglePressed),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let run_section = column![
            row![
                text("Folder Name").width(Length::Fixed(150.0)),
                text_input("e.g. 6-000123", &self.state.folder_name)
                    .on_input(Message::FolderNameChanged)
                    .on_submit(Message::CreateFolderPressed)
                    .width(Length::Fill),
            ]
            .spacing(10)
            .align_items(Alignment::Center),
            row![
                checkbox("Use today's date as subfolder", self.state.use_date)
                    .on_toggle(Message::UseDateToggled),
                checkbox("Extract files", self.state.extract).on_toggle(Message::ExtractToggled),
            ]
            .spacing(20),
            button(if self.state.is_running { "Running..." } else { "Create Folder" })
                .on_press_maybe(if self.state.is_running {
                    None
                } else {
                    Some(Message::CreateFolderPressed)
                })
                .padding(10),
        ]
        .spacing(10);

        let paths_section = column![
            text("Edit Paths"),
            self.path_row(PathField::Source),
            self.path_row(PathField::Output),
            self.path_row(PathField::Processed),
            button("Save").on_press(Message::SavePathsPressed),
        ]
        .spacing(8);

        let error_section: Element<Message> = if let Some(error) = &self.state.error_message {
            container(text(format!("ERROR: {}", error)))
                .padding(10)
                .into()
        } else {
            text("").into()
        };

        column![
            toolbar,
            self.file_table(),
            run_section,
            self.status_section(),
            error_section,
            horizontal_rule(1),
            paths_section,
        ]
        .spacing(15)
        .padding(20)
        .into()
    }
}
