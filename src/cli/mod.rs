//!
//! complaint_desk command line
//! ---------------------------
//! Argument parsing and command execution for the `complaint_desk` binary.
//! Commands return their output as lines so they can be exercised without a terminal.

pub mod outputformatter;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::complaints::{ComplaintDetailView, ComplaintFeed, ComplaintService, ListFilter, ListScope, NewComplaint, Status};
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::{Gateway, HttpTransport, Transport};
use crate::identity::{FilePersistence, ProfileUpdate, RegistrationForm, SessionController, SessionPersistence, SessionStore};
use outputformatter::{complaint_table, detail_lines, session_lines, terminal_width, timeline_lines};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { identifier: String, password: Option<String> },
    Logout,
    Whoami,
    Register { full_name: String, email: String, student_id: String, password: String, accept_terms: bool },
    ForgotPassword { email: String },
    ResetPassword { token: String, password: String },
    List { scope: ListScope, filter: ListFilter, page: Option<u32> },
    Show { id: u64 },
    History { id: u64 },
    Create { text: String, category: Option<String> },
    Transition { id: u64, status: Status, comment: Option<String> },
    Respond { id: u64, comment: String },
    Feedback { id: u64, comment: String },
    Profile { update: ProfileUpdate },
    Avatar { path: PathBuf },
    Help,
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} <command> [args]\n\nAccount:\n  login <username|email> [--password <p>]   sign in (password read from stdin when omitted)\n  logout                                    forget the stored session\n  whoami                                    refresh and show the session\n  register --name <full name> --email <e> --password <p> [--student-id <id>] --accept-terms\n  forgot-password <email>                   request a reset link\n  reset-password <token> --password <p>     set a new password\n  profile [--username <u>] [--email <e>] [--first-name <f>] [--last-name <l>]\n  avatar <image file>                       replace the profile picture\n\nComplaints:\n  list [--status <S>] [--search <text>] [--page <n>]    your complaints (all pages unless --page)\n  queue [--status <S>] [--search <text>] [--page <n>]   staff queue\n  show <id>                                 complaint with its history\n  history <id>                              history only\n  create <text> [--category <c>]            submit a complaint\n  transition <id> <status> [--comment <c>]  staff: move a complaint forward\n  respond <id> <comment>                    staff: add a response\n  feedback <id> <comment>                   owner: comment on a decided complaint\n\nStatuses: SUBMITTED (NEW), IN_REVIEW, IN_PROGRESS, RESOLVED, REJECTED, ACCEPTED, CLOSED\n\nEnvironment:\n  COMPLAINT_API_BASE, COMPLAINT_SESSION_DIR, COMPLAINT_TIMEOUT_MS,\n  COMPLAINT_ALLOWED_EMAIL_DOMAINS, COMPLAINT_PRIVILEGE_DOWNGRADE_AFTER, COMPLAINT_DESK_CONFIG, RUST_LOG"
    )
}

/// Pull `--flag value` pairs and bare switches out of `args`, leaving positionals in order.
struct Args {
    positional: Vec<String>,
    flags: Vec<(String, Option<String>)>,
}

const SWITCHES: &[&str] = &["--accept-terms"];

impl Args {
    fn split(args: &[String]) -> Result<Self, String> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let a = &args[i];
            if a.starts_with("--") {
                if SWITCHES.contains(&a.as_str()) {
                    flags.push((a.clone(), None));
                    i += 1;
                    continue;
                }
                if i + 1 >= args.len() { return Err(format!("{} requires a value", a)); }
                flags.push((a.clone(), Some(args[i + 1].clone())));
                i += 2;
                continue;
            }
            positional.push(a.clone());
            i += 1;
        }
        Ok(Self { positional, flags })
    }

    fn flag(&self, name: &str) -> Option<String> {
        self.flags.iter().rev().find(|(k, _)| k == name).and_then(|(_, v)| v.clone())
    }

    fn switch(&self, name: &str) -> bool { self.flags.iter().any(|(k, _)| k == name) }

    fn pos(&self, i: usize, what: &str) -> Result<String, String> {
        self.positional.get(i).cloned().ok_or_else(|| format!("missing {}", what))
    }

    fn id(&self, i: usize) -> Result<u64, String> {
        let raw = self.pos(i, "complaint id")?;
        match raw.trim().trim_start_matches('#').parse::<u64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(format!("'{}' is not a complaint id", raw)),
        }
    }

    /// Remaining positionals from `i` joined as free text.
    fn text_from(&self, i: usize, what: &str) -> Result<String, String> {
        let text = self.positional.iter().skip(i).cloned().collect::<Vec<_>>().join(" ");
        if text.trim().is_empty() { Err(format!("missing {}", what)) } else { Ok(text) }
    }

    fn filter(&self) -> Result<ListFilter, String> {
        let status = match self.flag("--status") {
            Some(s) => Some(s.parse::<Status>().map_err(|e| e.message().to_string())?),
            None => None,
        };
        Ok(ListFilter { status, search: self.flag("--search").filter(|s| !s.trim().is_empty()) })
    }

    fn page(&self) -> Result<Option<u32>, String> {
        match self.flag("--page") {
            Some(p) => p.parse::<u32>().ok().filter(|n| *n > 0).map(Some).ok_or_else(|| format!("bad --page '{}'", p)),
            None => Ok(None),
        }
    }
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let (name, rest) = match args.split_first() {
            Some((n, r)) => (n.as_str(), r),
            None => return Ok(Command::Help),
        };
        let a = Args::split(rest)?;
        let cmd = match name {
            "login" => Command::Login { identifier: a.pos(0, "username or email")?, password: a.flag("--password") },
            "logout" => Command::Logout,
            "whoami" => Command::Whoami,
            "register" => Command::Register {
                full_name: a.flag("--name").ok_or("missing --name")?,
                email: a.flag("--email").ok_or("missing --email")?,
                student_id: a.flag("--student-id").unwrap_or_default(),
                password: a.flag("--password").ok_or("missing --password")?,
                accept_terms: a.switch("--accept-terms"),
            },
            "forgot-password" => Command::ForgotPassword { email: a.pos(0, "email")? },
            "reset-password" => Command::ResetPassword { token: a.pos(0, "reset token")?, password: a.flag("--password").ok_or("missing --password")? },
            "list" => Command::List { scope: ListScope::Own, filter: a.filter()?, page: a.page()? },
            "queue" => Command::List { scope: ListScope::StaffQueue, filter: a.filter()?, page: a.page()? },
            "show" => Command::Show { id: a.id(0)? },
            "history" => Command::History { id: a.id(0)? },
            "create" => Command::Create { text: a.text_from(0, "complaint text")?, category: a.flag("--category") },
            "transition" => Command::Transition {
                id: a.id(0)?,
                status: a.pos(1, "target status")?.parse::<Status>().map_err(|e| e.message().to_string())?,
                comment: a.flag("--comment"),
            },
            "respond" => Command::Respond { id: a.id(0)?, comment: a.text_from(1, "comment")? },
            "feedback" => Command::Feedback { id: a.id(0)?, comment: a.text_from(1, "comment")? },
            "profile" => Command::Profile {
                update: ProfileUpdate {
                    username: a.flag("--username"),
                    email: a.flag("--email"),
                    first_name: a.flag("--first-name"),
                    last_name: a.flag("--last-name"),
                },
            },
            "avatar" => Command::Avatar { path: PathBuf::from(a.pos(0, "image file")?) },
            "help" | "-h" | "--help" => Command::Help,
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(cmd)
    }
}

/// Everything a command needs, wired over one session and one gateway.
pub struct App {
    pub config: Arc<ClientConfig>,
    pub session: SessionController,
    pub complaints: Arc<ComplaintService>,
    color: bool,
}

impl App {
    /// HTTP transport against `api_base_url`, session persisted under `session_dir`.
    pub fn from_config(config: ClientConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&config.api_base_url, std::time::Duration::from_millis(config.request_timeout_ms))?;
        let persistence = FilePersistence::new(config.session_dir.clone());
        Ok(Self::assemble(config, Arc::new(transport), Arc::new(persistence), outputformatter::use_color()))
    }

    pub fn assemble(config: ClientConfig, transport: Arc<dyn Transport>, persistence: Arc<dyn SessionPersistence>, color: bool) -> Self {
        let config = Arc::new(config);
        let gateway = Gateway::new(transport, SessionStore::open(persistence));
        Self {
            session: SessionController::new(gateway.clone(), config.clone()),
            complaints: Arc::new(ComplaintService::new(gateway)),
            config,
            color,
        }
    }

    pub fn store(&self) -> &SessionStore { self.session.store() }

    fn require_session(&self) -> AppResult<()> {
        if self.store().get().is_authenticated() { Ok(()) } else { Err(AppError::session_expired("no_credential", "not signed in")) }
    }

    pub async fn run(&self, cmd: Command) -> AppResult<Vec<String>> {
        debug!(target: "complaint_desk::cli", "running {:?}", std::mem::discriminant(&cmd));
        match cmd {
            Command::Help => Ok(vec![usage("complaint_desk")]),
            Command::Login { identifier, password } => {
                let password = match password {
                    Some(p) => p,
                    None => read_secret()?,
                };
                self.session.login(&identifier, &password).await?;
                let mut out = vec!["Signed in.".to_string()];
                out.extend(session_lines(&self.store().get()));
                Ok(out)
            }
            Command::Logout => {
                self.session.logout();
                Ok(vec!["Signed out.".to_string()])
            }
            Command::Whoami => {
                self.session.refresh().await;
                Ok(session_lines(&self.store().get()))
            }
            Command::Register { full_name, email, student_id, password, accept_terms } => {
                let form = RegistrationForm { full_name, email, student_id, confirm_password: password.clone(), password, accepted_terms: accept_terms };
                self.session.auth().register(&form).await?;
                Ok(vec!["Account created. You can now sign in.".to_string()])
            }
            Command::ForgotPassword { email } => {
                self.session.auth().request_password_reset(&email).await?;
                Ok(vec!["If the address is registered, a reset link is on its way.".to_string()])
            }
            Command::ResetPassword { token, password } => {
                self.session.auth().reset_password(&token, &password, &password).await?;
                Ok(vec!["Password updated. You can now sign in.".to_string()])
            }
            Command::List { scope, filter, page } => {
                self.require_session()?;
                let mut feed = ComplaintFeed::new(filter);
                match page {
                    Some(p) => {
                        let got = self.complaints.list(scope, feed.filter(), p).await?;
                        let shown: Vec<_> = got.items.iter().collect();
                        let mut out = complaint_table(&shown, self.color).render(terminal_width(), self.color);
                        out.push(format!("{} shown{}", shown.len(), if got.has_more { ", more on the next page" } else { "" }));
                        Ok(out)
                    }
                    None => {
                        while self.complaints.load_more(scope, &mut feed).await? {}
                        let shown = feed.visible();
                        if shown.is_empty() { return Ok(vec!["No complaints match.".to_string()]); }
                        let mut out = complaint_table(&shown, self.color).render(terminal_width(), self.color);
                        out.push(format!("{} shown", shown.len()));
                        Ok(out)
                    }
                }
            }
            Command::Show { id } => {
                self.require_session()?;
                let view = ComplaintDetailView::new(self.complaints.clone());
                let state = view.load(id).await;
                view.close();
                let mut out = detail_lines(&state, self.color);
                if let Some(status) = state.current_status() {
                    let next = status.available_transitions(self.store().get().is_privileged);
                    if !next.is_empty() {
                        out.push(String::new());
                        out.push(format!("Next: {}", next.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")));
                    }
                }
                Ok(out)
            }
            Command::History { id } => {
                self.require_session()?;
                Ok(timeline_lines(&self.complaints.get_history(id).await?))
            }
            Command::Create { text, category } => {
                self.require_session()?;
                let c = self.complaints.create(&NewComplaint { text, category }).await?;
                Ok(vec![format!("Complaint #{} submitted ({}).", c.id, c.status.label())])
            }
            Command::Transition { id, status, comment } => {
                self.require_session()?;
                self.complaints.get_detail(id).await?;
                let c = self.complaints.transition_status(id, status, comment.as_deref()).await?;
                Ok(vec![format!("Complaint #{} is now {}.", c.id, c.status.label())])
            }
            Command::Respond { id, comment } => {
                self.require_session()?;
                self.complaints.add_response(id, &comment).await?;
                Ok(vec![format!("Response added to complaint #{}.", id)])
            }
            Command::Feedback { id, comment } => {
                self.require_session()?;
                self.complaints.get_detail(id).await?;
                self.complaints.submit_feedback(id, &comment).await?;
                Ok(vec![format!("Feedback sent for complaint #{}.", id)])
            }
            Command::Profile { update } => {
                self.require_session()?;
                let sync = self.session.synchronizer();
                if update.is_empty() {
                    sync.sync().await?;
                } else {
                    sync.update_profile(&update).await?;
                }
                Ok(session_lines(&self.store().get()))
            }
            Command::Avatar { path } => {
                self.require_session()?;
                let bytes = std::fs::read(&path)
                    .map_err(|e| AppError::validation("avatar_unreadable", format!("cannot read {}: {}", path.display(), e)))?;
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("avatar").to_string();
                self.session.synchronizer().replace_avatar(&name, bytes).await?;
                Ok(session_lines(&self.store().get()))
            }
        }
    }
}

fn read_secret() -> AppResult<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::validation("password_unreadable", e.to_string()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayResponse, Method, ScriptedTransport};
    use crate::identity::MemoryPersistence;
    use serde_json::json;

    fn argv(s: &str) -> Vec<String> { s.split_whitespace().map(|x| x.to_string()).collect() }

    fn app() -> (Arc<ScriptedTransport>, App) {
        let t = Arc::new(ScriptedTransport::new());
        let app = App::assemble(ClientConfig::default(), t.clone(), Arc::new(MemoryPersistence::new()), false);
        (t, app)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::Help);
        assert_eq!(
            Command::parse(&argv("queue --status new --search 42")).unwrap(),
            Command::List { scope: ListScope::StaffQueue, filter: ListFilter { status: Some(Status::Submitted), search: Some("42".into()) }, page: None }
        );
        assert_eq!(
            Command::parse(&argv("transition #5 resolved --comment done")).unwrap(),
            Command::Transition { id: 5, status: Status::Resolved, comment: Some("done".into()) }
        );
        assert_eq!(Command::parse(&argv("respond 5 we are on it")).unwrap(), Command::Respond { id: 5, comment: "we are on it".into() });
        assert!(Command::parse(&argv("show 0")).is_err());
        assert!(Command::parse(&argv("list --page")).is_err());
        assert!(Command::parse(&argv("transition 5 pending")).is_err());
        assert!(Command::parse(&argv("frobnicate")).is_err());
    }

    #[tokio::test]
    async fn commands_need_a_session() {
        let (t, app) = app();
        let e = app.run(Command::Show { id: 5 }).await.unwrap_err();
        assert!(e.clears_session());
        assert_eq!(t.call_count(), 0);
    }

    #[tokio::test]
    async fn list_pages_through_everything() {
        let (t, app) = app();
        app.store().set_credential("tok-1");
        t.reply(Method::Get, "complaints/?page=1", GatewayResponse::success(200, Some(json!({"results": [
            {"id": 1, "text": "a", "status": "NEW", "created_at": "2025-10-01T08:00:00Z"}
        ], "next": "x"}))));
        t.reply(Method::Get, "complaints/?page=2", GatewayResponse::success(200, Some(json!([
            {"id": 2, "text": "b", "status": "CLOSED", "created_at": "2025-10-02T08:00:00Z"}
        ]))));
        let out = app.run(Command::parse(&argv("list")).unwrap()).await.unwrap();
        assert_eq!(out.last().map(|s| s.as_str()), Some("2 shown"));
        assert!(out[3].contains("Closed"));
    }

    #[tokio::test]
    async fn transition_fetches_status_first() {
        let (t, app) = app();
        app.store().set_credential("tok-1");
        t.reply(Method::Get, "complaints/5/", GatewayResponse::success(200, Some(json!({"id": 5, "status": "RESOLVED", "created_at": "2025-10-01T08:00:00Z"}))));
        let e = app.run(Command::Transition { id: 5, status: Status::InReview, comment: None }).await.unwrap_err();
        assert!(matches!(e, AppError::InvalidTransition { .. }));
        assert_eq!(t.call_count(), 1);
    }
}
