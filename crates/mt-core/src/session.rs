//! Session and visibility protocol.
//!
//! Each client runs one [`TrackerClient`]. Local actions and incoming
//! broadcasts both return [`Effect`]s for the host to carry out: opening or
//! closing the window, and publishing messages. Window lifecycle per user is
//! `Closed -> Opening -> Open -> Closed`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::authority::{AuthorityLevel, Roster, UserId};
use crate::device::{TickReport, TrackerDevice};
use crate::geometry::TokenId;
use crate::protocol::{MessageKind, TrackerMessage};
use crate::scene::{MapProvider, SceneId};
use crate::settings::TrackerSettings;
use crate::surface::{AudioSink, RenderCache, RenderSurface};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Open,
    Closed,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Open => "open",
            Visibility::Closed => "closed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    Closed,
    /// Window requested, waiting for the host to hand over a surface.
    Opening,
    Open,
}

/// Who owns the tracker being viewed and what it points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub owner_id: UserId,
    pub viewed_scene_id: SceneId,
    pub tracked_token_id: Option<TokenId>,
}

/// Side effects for the host, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    OpenWindow { size: u32 },
    /// Window must be re-rendered at a new size; call
    /// [`TrackerClient::attach_device`] again once it is.
    ResizeWindow { size: u32 },
    CloseWindow,
    Publish(TrackerMessage),
}

pub struct TrackerClient {
    user_id: UserId,
    roster: Roster,
    settings: TrackerSettings,
    cache: Arc<RenderCache>,
    window: WindowState,
    session: Option<Session>,
    /// Participant list kept by privileged users only.
    visibility_by_user: BTreeMap<UserId, Visibility>,
    device: Option<TrackerDevice>,
}

impl TrackerClient {
    pub fn new(
        user_id: &str,
        roster: Roster,
        settings: TrackerSettings,
        cache: Arc<RenderCache>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            roster,
            settings,
            cache,
            window: WindowState::Closed,
            session: None,
            visibility_by_user: BTreeMap::new(),
            device: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn authority(&self) -> AuthorityLevel {
        self.roster.authority_of(&self.user_id)
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn window(&self) -> WindowState {
        self.window
    }

    pub fn is_open(&self) -> bool {
        self.window != WindowState::Closed
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_owner(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.owner_id == self.user_id)
    }

    pub fn visibility_by_user(&self) -> &BTreeMap<UserId, Visibility> {
        &self.visibility_by_user
    }

    pub fn device(&self) -> Option<&TrackerDevice> {
        self.device.as_ref()
    }

    /// Whether this user may start a tracker of their own.
    pub fn can_open_own(&self) -> bool {
        self.settings.enabled && (!self.settings.gm_only || self.authority().is_privileged())
    }

    // --- Local actions ---

    /// Open a tracker owned by this user. Without an explicit token the first
    /// controlled token is tracked.
    pub fn open(
        &mut self,
        scene_id: &str,
        token_id: Option<&str>,
        controlled: &[TokenId],
    ) -> Vec<Effect> {
        if !self.can_open_own() {
            tracing::debug!("{} may not open a tracker", self.user_id);
            return Vec::new();
        }
        let token = token_id
            .map(str::to_string)
            .or_else(|| controlled.first().cloned());

        if self.is_owner() && self.is_open() {
            return self.change_target(scene_id, token.as_deref());
        }

        let mut effects = Vec::new();
        self.begin(
            Session {
                owner_id: self.user_id.clone(),
                viewed_scene_id: scene_id.to_string(),
                tracked_token_id: token.clone(),
            },
            &mut effects,
        );
        effects.push(Effect::Publish(
            TrackerMessage::new(MessageKind::Init, &self.user_id, &self.user_id)
                .tracking(scene_id, token.as_deref()),
        ));
        effects
    }

    /// Show the owned tracker to one user, or to everyone with `None`.
    pub fn share(&self, target: Option<&str>) -> Vec<Effect> {
        let Some(session) = self.session.as_ref().filter(|s| s.owner_id == self.user_id) else {
            return Vec::new();
        };
        vec![Effect::Publish(
            TrackerMessage::new(MessageKind::Open, &self.user_id, &self.user_id)
                .tracking(&session.viewed_scene_id, session.tracked_token_id.as_deref())
                .for_user(target),
        )]
    }

    /// Re-point the owned tracker without closing anyone's window.
    pub fn change_target(&mut self, scene_id: &str, token_id: Option<&str>) -> Vec<Effect> {
        if !self.is_owner() {
            return Vec::new();
        }
        self.retarget(scene_id, token_id);
        vec![Effect::Publish(
            TrackerMessage::new(MessageKind::ChangeTarget, &self.user_id, &self.user_id)
                .tracking(scene_id, token_id),
        )]
    }

    /// Close this user's window. An owner closes the session for everyone;
    /// anyone else only announces that their own view closed.
    pub fn close(&mut self) -> Vec<Effect> {
        self.close_local(true)
    }

    /// The host's window was closed from outside (e.g. its close button).
    pub fn window_closed(&mut self) -> Vec<Effect> {
        self.close_local(false)
    }

    pub fn toggle(
        &mut self,
        scene_id: &str,
        token_id: Option<&str>,
        controlled: &[TokenId],
    ) -> Vec<Effect> {
        if self.is_open() {
            self.close()
        } else {
            self.open(scene_id, token_id, controlled)
        }
    }

    /// Close another user's view. Privileged users only; the receiver still
    /// checks rank against its session owner.
    pub fn force_close(&self, user: &str) -> Vec<Effect> {
        if !self.authority().is_privileged() {
            return Vec::new();
        }
        let owner = self
            .session
            .as_ref()
            .map_or(self.user_id.as_str(), |s| s.owner_id.as_str());
        vec![Effect::Publish(
            TrackerMessage::new(MessageKind::Close, &self.user_id, owner).for_user(Some(user)),
        )]
    }

    // --- Host lifecycle ---

    /// The window rendered and handed over its surface: build the device.
    pub fn attach_device(&mut self, surface: &mut dyn RenderSurface) -> bool {
        if self.window != WindowState::Opening {
            return false;
        }
        let Some(session) = &self.session else {
            return false;
        };

        let mut device = TrackerDevice::new(self.settings.clone(), Arc::clone(&self.cache));
        device.initialize(surface);
        device.set_target(&session.viewed_scene_id, session.tracked_token_id.as_deref());
        self.device = Some(device);
        self.window = WindowState::Open;
        true
    }

    pub fn tick(
        &mut self,
        dt: f64,
        now: Duration,
        map: &dyn MapProvider,
        audio: &mut dyn AudioSink,
        surface: &mut dyn RenderSurface,
    ) -> Option<TickReport> {
        self.device.as_mut()?.tick(dt, now, map, audio, surface)
    }

    /// Apply changed settings. A new size tears the device down and asks the
    /// host for a re-render.
    pub fn update_settings(&mut self, settings: TrackerSettings) -> Vec<Effect> {
        let resized = settings.size != self.settings.size;
        self.settings = settings;
        if !self.is_open() {
            return Vec::new();
        }

        if resized {
            if let Some(mut device) = self.device.take() {
                device.stop();
            }
            self.window = WindowState::Opening;
            vec![Effect::ResizeWindow {
                size: self.settings.size,
            }]
        } else {
            if let Some(device) = &mut self.device {
                device.update_settings(self.settings.clone());
            }
            Vec::new()
        }
    }

    // --- Incoming messages ---

    pub fn handle(&mut self, message: &TrackerMessage) -> Vec<Effect> {
        if self.authority().is_privileged() {
            self.record_visibility(message);
        }
        if message.is_notify() || message.sender_id == self.user_id {
            return Vec::new();
        }

        match message.kind {
            MessageKind::Init => self.on_init(message),
            MessageKind::Open => self.on_open(message),
            MessageKind::Close => self.on_close(message),
            MessageKind::ChangeTarget => self.on_change_target(message),
        }
    }

    fn on_init(&mut self, message: &TrackerMessage) -> Vec<Effect> {
        let me = self.authority();
        let owner = self.roster.authority_of(&message.owner_id);
        if !me.is_privileged() || !me.outranks(owner) {
            return Vec::new();
        }
        // keep our own tracker rather than jumping to theirs
        if self.is_owner() && self.is_open() {
            return Vec::new();
        }
        self.join(message)
    }

    fn on_open(&mut self, message: &TrackerMessage) -> Vec<Effect> {
        if !message.applies_to(&self.user_id) {
            return Vec::new();
        }
        self.join(message)
    }

    fn on_close(&mut self, message: &TrackerMessage) -> Vec<Effect> {
        if !message.applies_to(&self.user_id) {
            return Vec::new();
        }
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let sender = self.roster.authority_of(&message.sender_id);
        let owner = self.roster.authority_of(&session.owner_id);
        if !sender.can_override(owner) {
            tracing::debug!(
                "{} ignoring close from {} ({sender}) over {}'s session ({owner})",
                self.user_id,
                message.sender_id,
                session.owner_id,
            );
            return Vec::new();
        }

        // a closed owner takes its viewers down with it
        let message = self.closing_message(session);
        let mut effects = self.teardown();
        effects.push(Effect::Publish(message));
        effects
    }

    fn on_change_target(&mut self, message: &TrackerMessage) -> Vec<Effect> {
        if !message.applies_to(&self.user_id) {
            return Vec::new();
        }
        let same_session = self
            .session
            .as_ref()
            .is_some_and(|s| s.owner_id == message.owner_id);
        if !same_session {
            return Vec::new();
        }
        if let Some(scene) = message.viewed_scene_id.as_deref() {
            self.retarget(scene, message.tracked_token_id.as_deref());
        }
        Vec::new()
    }

    // --- Internals ---

    /// View someone else's session, announcing it if the window was closed.
    fn join(&mut self, message: &TrackerMessage) -> Vec<Effect> {
        let Some(scene) = message.viewed_scene_id.as_deref() else {
            tracing::debug!("{} message without scene ignored", self.user_id);
            return Vec::new();
        };

        let mut effects = Vec::new();
        let opened = self.begin(
            Session {
                owner_id: message.owner_id.clone(),
                viewed_scene_id: scene.to_string(),
                tracked_token_id: message.tracked_token_id.clone(),
            },
            &mut effects,
        );
        if opened {
            effects.push(Effect::Publish(
                TrackerMessage::new(MessageKind::Open, &self.user_id, &message.owner_id)
                    .tracking(scene, message.tracked_token_id.as_deref())
                    .for_user(Some(&self.user_id))
                    .as_notify(),
            ));
        }
        effects
    }

    /// Install `session`, requesting a window if none is up. Returns whether
    /// a window was requested.
    fn begin(&mut self, session: Session, effects: &mut Vec<Effect>) -> bool {
        if let Some(device) = &mut self.device {
            device.set_target(&session.viewed_scene_id, session.tracked_token_id.as_deref());
        }
        tracing::info!(
            "{} viewing {}'s tracker on {}",
            self.user_id,
            session.owner_id,
            session.viewed_scene_id
        );
        self.session = Some(session);

        if self.window == WindowState::Closed {
            self.window = WindowState::Opening;
            effects.push(Effect::OpenWindow {
                size: self.settings.size,
            });
            true
        } else {
            false
        }
    }

    fn retarget(&mut self, scene_id: &str, token_id: Option<&str>) {
        if let Some(session) = &mut self.session {
            session.viewed_scene_id = scene_id.to_string();
            session.tracked_token_id = token_id.map(str::to_string);
        }
        if let Some(device) = &mut self.device {
            device.set_target(scene_id, token_id);
        }
    }

    fn close_local(&mut self, close_window: bool) -> Vec<Effect> {
        let Some(session) = &self.session else {
            return Vec::new();
        };

        let message = self.closing_message(session);
        let mut effects = self.teardown();
        if !close_window {
            effects.retain(|e| *e != Effect::CloseWindow);
        }
        effects.push(Effect::Publish(message));
        effects
    }

    /// Owners close the session for everyone; viewers only announce their
    /// own view closing.
    fn closing_message(&self, session: &Session) -> TrackerMessage {
        if session.owner_id == self.user_id {
            TrackerMessage::new(MessageKind::Close, &self.user_id, &self.user_id)
                .tracking(&session.viewed_scene_id, session.tracked_token_id.as_deref())
        } else {
            TrackerMessage::new(MessageKind::Close, &self.user_id, &session.owner_id)
                .for_user(Some(&self.user_id))
                .as_notify()
        }
    }

    /// Stop the device first so no tick sees a half-closed session.
    fn teardown(&mut self) -> Vec<Effect> {
        if let Some(mut device) = self.device.take() {
            device.stop();
        }
        if let Some(session) = self.session.take() {
            tracing::info!("{} closed {}'s tracker", self.user_id, session.owner_id);
        }
        self.window = WindowState::Closed;
        vec![Effect::CloseWindow]
    }

    fn record_visibility(&mut self, message: &TrackerMessage) {
        let state = match message.kind {
            MessageKind::Close => Visibility::Closed,
            _ => Visibility::Open,
        };
        let user = message
            .target_id
            .clone()
            .unwrap_or_else(|| message.sender_id.clone());
        self.visibility_by_user.insert(user, state);
    }
}
