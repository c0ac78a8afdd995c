//! Stateless page guards, independent of the engine.
//!
//! - [`enforce_top_level`] refuses to render inside a foreign frame and
//!   pulls the top window to the page's own location instead.
//! - [`RouteGuard`] keeps navigation inside an allow-list of paths.

use crate::config::RouteGuardConfig;
use crate::core::engine::HookError;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The framing environment of a page.
pub trait FrameContext {
    /// Whether this page is the top-level browsing context.
    fn is_top_level(&self) -> bool;
    /// This page's own location.
    fn own_location(&self) -> String;
    /// Navigate the top-level context to `location`.
    fn redirect_top(&mut self, location: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum FrameVerdict {
    /// Not framed, render normally
    Render,
    /// Framed; the top window was sent to `location` and nothing renders
    BrokeOut { location: String },
}

impl FrameVerdict {
    pub fn should_render(&self) -> bool {
        matches!(self, FrameVerdict::Render)
    }
}

/// Break out of any embedding frame.
pub fn enforce_top_level(frame: &mut dyn FrameContext) -> FrameVerdict {
    if frame.is_top_level() {
        return FrameVerdict::Render;
    }
    let location = frame.own_location();
    tracing::info!(location = %location, "page framed, redirecting top window");
    frame.redirect_top(&location);
    FrameVerdict::BrokeOut { location }
}

/// Something that can change the current route.
pub trait Navigator {
    fn navigate(&mut self, path: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum RouteVerdict {
    Allowed,
    /// Route not allowed; `redirected_to` is None when the blocked route is
    /// already the fallback
    Blocked {
        path: String,
        redirected_to: Option<String>,
    },
}

/// Callback told about every blocked path.
pub type BlockHook = Box<dyn FnMut(&str) -> Result<(), HookError>>;

/// Route allow-list guard.
pub struct RouteGuard {
    allowed_routes: Vec<String>,
    redirect_to: String,
    on_block: Option<BlockHook>,
}

impl RouteGuard {
    /// Fallback path when none is configured.
    pub const DEFAULT_REDIRECT: &'static str = "/";

    /// An empty list allows every route.
    pub fn new(allowed_routes: Vec<String>) -> Self {
        Self {
            allowed_routes,
            redirect_to: Self::DEFAULT_REDIRECT.to_string(),
            on_block: None,
        }
    }

    pub fn from_config(config: &RouteGuardConfig) -> Self {
        let guard = Self::new(config.allowed_routes.clone());
        match &config.redirect_to {
            Some(path) => guard.redirect_to(path.clone()),
            None => guard,
        }
    }

    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    pub fn on_block<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str) -> Result<(), HookError> + 'static,
    {
        self.on_block = Some(Box::new(hook));
        self
    }

    /// Exact-match allow-list check.
    pub fn is_allowed(&self, path: &str) -> bool {
        self.allowed_routes.is_empty() || self.allowed_routes.iter().any(|r| r == path)
    }

    /// Check the route just navigated to. A blocked route notifies
    /// `on_block` first, then redirects to the fallback path.
    pub fn check(&mut self, path: &str, navigator: &mut dyn Navigator) -> RouteVerdict {
        if self.is_allowed(path) {
            return RouteVerdict::Allowed;
        }

        tracing::info!(path = %path, redirect = %self.redirect_to, "route blocked");
        if let Some(hook) = self.on_block.as_mut() {
            match catch_unwind(AssertUnwindSafe(|| hook(path))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(path = %path, error = %e, "route block hook failed"),
                Err(_) => tracing::warn!(path = %path, "route block hook panicked"),
            }
        }

        // Redirecting onto the same path would loop
        let redirected_to = if path == self.redirect_to {
            None
        } else {
            navigator.navigate(&self.redirect_to);
            Some(self.redirect_to.clone())
        };

        RouteVerdict::Blocked {
            path: path.to_string(),
            redirected_to,
        }
    }
}
