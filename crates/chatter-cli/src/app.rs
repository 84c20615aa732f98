//! Terminal front end: several signed-in users sharing one store.
//!
//! Each user gets their own [`ChatSession`]; live updates of every session
//! are printed as they arrive, tagged with the receiving user's id, so one
//! terminal shows both ends of a conversation.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::warn;

use chatter_core::{
    Action, ChatError, ChatSession, CoreConfig, Directory, InboxCallback, MessagesCallback,
    SessionState, StaticAuth,
};
use chatter_shared::{Profile, UserId};
use chatter_store::DocumentStore;

use crate::commands::{Command, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    store: Arc<dyn DocumentStore>,
    directory: Directory,
    config: CoreConfig,
    sessions: BTreeMap<UserId, ChatSession>,
    active: Option<UserId>,
}

impl App {
    pub fn new(store: Arc<dyn DocumentStore>, config: CoreConfig) -> Self {
        Self {
            directory: Directory::new(Arc::clone(&store)),
            store,
            config,
            sessions: BTreeMap::new(),
            active: None,
        }
    }

    /// Prompt for the next line, e.g. `u1>`.
    pub fn prompt(&self) -> String {
        match &self.active {
            Some(uid) => format!("{uid}> "),
            None => "> ".to_string(),
        }
    }

    pub async fn handle(&mut self, command: Command) -> Flow {
        let result = match command {
            Command::Empty => Ok(()),
            Command::Help => {
                println!("{HELP}");
                Ok(())
            }
            Command::Quit => return Flow::Quit,
            Command::Signup { uid, email, name } => self.signup(&uid, &email, &name).await,
            Command::Login { uid } => self.login(&uid).await,
            Command::Whoami => {
                self.whoami();
                Ok(())
            }
            Command::Search { text } => self.search(&text).await,
            Command::Open { uid } => self.open(&uid).await,
            Command::Send { text } => self.send(&text).await,
            Command::Inbox => self.inbox().await,
            Command::History => self.history().await,
            Command::Logout => self.logout().await,
        };
        if let Err(message) = result {
            println!("! {message}");
        }
        Flow::Continue
    }

    /// Sign every session out.
    pub async fn shutdown(&mut self) {
        for (uid, session) in std::mem::take(&mut self.sessions) {
            if let Err(e) = session.sign_out().await {
                warn!(uid = %uid, error = %e, "sign-out failed during shutdown");
            }
        }
        self.active = None;
    }

    fn session(&self) -> Result<&ChatSession, String> {
        self.active
            .as_ref()
            .and_then(|uid| self.sessions.get(uid))
            .ok_or_else(|| "nobody is signed in; use `signup` or `login`".to_string())
    }

    async fn signup(&mut self, uid: &str, email: &str, name: &str) -> Result<(), String> {
        let uid = UserId::parse(uid).map_err(|e| e.to_string())?;
        let profile = Profile::for_signup(uid, name, email);
        let created = self
            .directory
            .ensure_profile(&profile)
            .await
            .map_err(|e| failure(&e, Action::SignIn))?;
        if !created {
            return Err(format!("{} already exists; use `login {}`", profile.uid, profile.uid));
        }
        self.start_session(profile).await
    }

    async fn login(&mut self, uid: &str) -> Result<(), String> {
        let uid = UserId::parse(uid).map_err(|e| e.to_string())?;
        if self.sessions.contains_key(&uid) {
            println!("switched to {uid}");
            self.active = Some(uid);
            return Ok(());
        }
        let profile = self
            .directory
            .get_profile(&uid)
            .await
            .map_err(|e| failure(&e, Action::SignIn))?
            .ok_or_else(|| format!("unknown user {uid}; use `signup` first"))?;
        self.start_session(profile).await
    }

    async fn start_session(&mut self, profile: Profile) -> Result<(), String> {
        let uid = profile.uid.clone();
        let session = ChatSession::start(
            Arc::clone(&self.store),
            Arc::new(StaticAuth::new(profile)),
            self.config.clone(),
        )
        .await
        .map_err(|e| failure(&e, Action::SignIn))?;

        session
            .subscribe_to_my_inbox(inbox_printer(uid.clone()))
            .await
            .map_err(|e| failure(&e, Action::LoadConversations))?;
        session
            .subscribe_to_open_conversation_messages(message_printer(uid.clone()))
            .map_err(|e| failure(&e, Action::LoadMessages))?;

        println!("signed in as {} ({})", session.me().display_name(), uid);
        self.sessions.insert(uid.clone(), session);
        self.active = Some(uid);
        Ok(())
    }

    fn whoami(&self) {
        match self.session() {
            Ok(session) => {
                let me = session.me();
                println!("{} <{}> [{}]", me.display_name(), me.email, me.uid);
                match session.state() {
                    SessionState::ConversationOpen(key) => {
                        let with = session
                            .counterparty()
                            .map(|p| p.display_name().to_string())
                            .unwrap_or_default();
                        println!("open conversation: {key} with {with}");
                    }
                    SessionState::NoActiveConversation => println!("no open conversation"),
                    SessionState::LoggedOut => println!("signed out"),
                }
            }
            Err(message) => println!("{message}"),
        }
        let others: Vec<_> = self.sessions.keys().map(UserId::as_str).collect();
        if !others.is_empty() {
            println!("sessions: {}", others.join(", "));
        }
    }

    async fn search(&self, text: &str) -> Result<(), String> {
        let results = self
            .session()?
            .search_users(text)
            .await
            .map_err(|e| failure(&e, Action::Search))?;
        if results.is_empty() {
            println!("no matches");
        }
        for profile in results {
            println!("  {:<12} {} <{}>", profile.uid.as_str(), profile.display_name(), profile.email);
        }
        Ok(())
    }

    async fn open(&self, uid: &str) -> Result<(), String> {
        let session = self.session()?;
        let uid = UserId::parse(uid).map_err(|e| e.to_string())?;
        let other = self
            .directory
            .get_profile(&uid)
            .await
            .map_err(|e| failure(&e, Action::OpenConversation))?
            .ok_or_else(|| format!("unknown user {uid}"))?;
        let opened = session
            .open_conversation(&other)
            .await
            .map_err(|e| failure(&e, Action::OpenConversation))?;
        println!("now chatting with {} ({})", other.display_name(), opened.key);
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), String> {
        let session = self.session()?;
        match session.send_message(text).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err("no open conversation; use `open <uid>`".to_string()),
            Err(e) => Err(failure(&e, Action::SendMessage)),
        }
    }

    async fn inbox(&self) -> Result<(), String> {
        let entries = self
            .session()?
            .list_my_conversations()
            .await
            .map_err(|e| failure(&e, Action::LoadConversations))?;
        if entries.is_empty() {
            println!("no conversations yet");
        }
        let now = Utc::now();
        for entry in entries {
            println!(
                "  {:<12} {:<20} {:<5} {}",
                entry.other_uid.as_str(),
                entry.display_name(),
                entry.last_active(now),
                entry.preview()
            );
        }
        Ok(())
    }

    async fn history(&self) -> Result<(), String> {
        let session = self.session()?;
        let me = session.me().uid.clone();
        let messages = session
            .history()
            .await
            .map_err(|e| failure(&e, Action::LoadMessages))?;
        if messages.is_empty() {
            println!("nothing here yet");
        }
        for message in messages {
            let who = if message.is_from(&me) {
                "me".to_string()
            } else {
                message.sender_id.to_string()
            };
            let at = message.created_at.to_datetime().format("%H:%M:%S");
            println!("  [{at}] {who}: {}", message.text);
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), String> {
        let uid = self.active.take().ok_or_else(|| "nobody is signed in".to_string())?;
        if let Some(session) = self.sessions.remove(&uid) {
            session.sign_out().await.map_err(|e| e.to_string())?;
        }
        println!("{uid} signed out");
        self.active = self.sessions.keys().next().cloned();
        Ok(())
    }
}

/// User-facing text for `error`; the details go to the log.
fn failure(error: &ChatError, action: Action) -> String {
    if !error.is_validation() {
        warn!(error = %error, ?action, "operation failed");
    }
    error.user_message(action)
}

fn inbox_printer(owner: UserId) -> InboxCallback {
    let last_seen = Mutex::new(None);
    Arc::new(move |snapshot| match snapshot {
        Ok(entries) => {
            let Some(top) = entries.first() else { return };
            let current = Some((top.chat_id.clone(), top.updated_at));
            let mut last_seen = last_seen.lock().unwrap_or_else(|p| p.into_inner());
            if *last_seen != current {
                *last_seen = current;
                println!("\n[{owner}] inbox: {} · {}", top.display_name(), top.preview());
            }
        }
        Err(e) => println!("\n[{owner}] {}", e.user_message(Action::LoadConversations)),
    })
}

fn message_printer(owner: UserId) -> MessagesCallback {
    let printed = Mutex::new(HashSet::new());
    Arc::new(move |snapshot| match snapshot {
        Ok(messages) => {
            let mut printed = printed.lock().unwrap_or_else(|p| p.into_inner());
            for message in messages {
                if printed.insert(message.id.clone()) && !message.is_from(&owner) {
                    println!("\n[{owner}] {}: {}", message.sender_id, message.text);
                }
            }
        }
        Err(e) => println!("\n[{owner}] {}", e.user_message(Action::LoadMessages)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_store::MemoryStore;

    fn app() -> App {
        App::new(Arc::new(MemoryStore::new()), CoreConfig::default())
    }

    async fn run(app: &mut App, line: &str) {
        let command = Command::parse(line).unwrap();
        assert_eq!(app.handle(command).await, Flow::Continue);
    }

    #[tokio::test]
    async fn test_two_users_in_one_process() {
        let mut app = app();
        run(&mut app, "signup u1 bob@example.com Bob").await;
        run(&mut app, "signup u2 ada@example.com Ada Lovelace").await;
        assert_eq!(app.prompt(), "u2> ");

        run(&mut app, "login u1").await;
        run(&mut app, "open u2").await;
        run(&mut app, "hey Ada").await;

        let bob = app.sessions.get(&UserId::parse("u1").unwrap()).unwrap();
        let entries = bob.list_my_conversations().await.unwrap();
        assert_eq!(entries[0].last_message, "hey Ada");

        let ada = app.sessions.get(&UserId::parse("u2").unwrap()).unwrap();
        let entries = ada.list_my_conversations().await.unwrap();
        assert_eq!(entries[0].last_message, "hey Ada");
        assert_eq!(entries[0].display_name(), "Bob");
    }

    #[tokio::test]
    async fn test_duplicate_signup_and_unknown_login() {
        let mut app = app();
        run(&mut app, "signup u1 bob@example.com").await;
        run(&mut app, "signup u1 other@example.com").await;
        assert_eq!(app.sessions.len(), 1);

        run(&mut app, "login nobody").await;
        assert_eq!(app.active, Some(UserId::parse("u1").unwrap()));
    }

    #[tokio::test]
    async fn test_logout_switches_to_remaining_session() {
        let mut app = app();
        run(&mut app, "signup u1 bob@example.com").await;
        run(&mut app, "signup u2 ada@example.com").await;
        run(&mut app, "logout").await;

        assert_eq!(app.active, Some(UserId::parse("u1").unwrap()));
        assert_eq!(app.sessions.len(), 1);
        assert_eq!(app.handle(Command::Quit).await, Flow::Quit);

        app.shutdown().await;
        assert!(app.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_signup_failure_reports_sign_in() {
        let store = Arc::new(MemoryStore::new());
        let mut app = App::new(store.clone(), CoreConfig::default());

        store.set_unavailable(true);
        let err = app.signup("u1", "bob@example.com", "Bob").await.unwrap_err();
        assert_eq!(err, "Sign-in failed. Try again.");
        assert!(app.sessions.is_empty());

        store.set_unavailable(false);
        app.signup("u1", "bob@example.com", "Bob").await.unwrap();
        assert_eq!(app.prompt(), "u1> ");
    }
}
