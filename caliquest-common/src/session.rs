//! Session context and navigation gating
//!
//! A [`SessionContext`] is built once per request from the authenticated user
//! id and passed explicitly to whatever needs it. It is a snapshot: after the
//! profile changes (profile setup), call [`SessionContext::refresh`].

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::Profile;
use crate::db::profiles;
use crate::{Error, Result};

/// Authenticated user plus their profile, if one exists yet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub profile: Option<Profile>,
}

impl SessionContext {
    pub async fn load(pool: &SqlitePool, user_id: Uuid) -> Result<Self> {
        let profile = profiles::get_profile(pool, user_id).await?;
        Ok(Self { user_id, profile })
    }

    /// Re-read the profile from the database
    pub async fn refresh(&mut self, pool: &SqlitePool) -> Result<()> {
        self.profile = profiles::get_profile(pool, self.user_id).await?;
        Ok(())
    }

    pub fn is_onboarded(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.onboarding_completed)
    }

    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_admin)
    }

    /// Game surfaces need a finished profile setup
    pub fn require_onboarded(&self) -> Result<&Profile> {
        match &self.profile {
            Some(p) if p.onboarding_completed => Ok(p),
            _ => Err(Error::OnboardingRequired),
        }
    }

    /// Profile setup is only reachable before onboarding
    pub fn require_profile_setup(&self) -> Result<()> {
        if self.is_onboarded() {
            return Err(Error::AlreadyOnboarded);
        }
        Ok(())
    }

    pub fn require_admin(&self) -> Result<&Profile> {
        match &self.profile {
            Some(p) if p.is_admin => Ok(p),
            _ => Err(Error::Forbidden("admin privileges required".to_string())),
        }
    }
}

/// Client-facing surfaces, used for the navigation hint returned with a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Landing,
    Auth,
    ProfileSetup,
    Game,
    Map,
    Level,
    Admin,
}

impl Surface {
    /// The surface actually shown when `self` is requested
    ///
    /// Returns `self` when the session may enter it, otherwise the surface the
    /// client should redirect to.
    pub fn resolve(self, session: Option<&SessionContext>) -> Surface {
        let onboarded = session.is_some_and(|s| s.is_onboarded());
        match (self, session) {
            (Surface::Landing, None) | (Surface::Auth, None) => self,
            (Surface::Landing, Some(_)) => Surface::Game.resolve(session),
            (Surface::Auth, Some(_)) => Surface::ProfileSetup.resolve(session),
            (Surface::ProfileSetup, None) | (Surface::Game, None) => Surface::Auth,
            (Surface::ProfileSetup, Some(_)) if onboarded => Surface::Game,
            (Surface::ProfileSetup, Some(_)) => Surface::ProfileSetup,
            (Surface::Game, Some(_)) if onboarded => Surface::Game,
            (Surface::Game, Some(_)) => Surface::ProfileSetup,
            (Surface::Map, _) | (Surface::Level, _) if onboarded => self,
            (Surface::Map, _) | (Surface::Level, _) => Surface::Game.resolve(session),
            (Surface::Admin, Some(s)) if s.is_admin() => Surface::Admin,
            (Surface::Admin, _) => Surface::Game.resolve(session),
        }
    }

    /// Where a freshly loaded client should land
    pub fn home(session: Option<&SessionContext>) -> Surface {
        Surface::Landing.resolve(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(profile: Option<(bool, bool)>) -> SessionContext {
        SessionContext {
            user_id: Uuid::new_v4(),
            profile: profile.map(|(onboarded, admin)| Profile {
                id: Uuid::new_v4(),
                username: "kim".to_string(),
                age: Some(30),
                avatar_url: None,
                is_admin: admin,
                onboarding_completed: onboarded,
            }),
        }
    }

    #[test]
    fn test_anonymous_is_sent_to_auth() {
        assert_eq!(Surface::home(None), Surface::Landing);
        assert_eq!(Surface::Game.resolve(None), Surface::Auth);
        assert_eq!(Surface::ProfileSetup.resolve(None), Surface::Auth);
        assert_eq!(Surface::Map.resolve(None), Surface::Auth);
        assert_eq!(Surface::Admin.resolve(None), Surface::Auth);
    }

    #[test]
    fn test_new_user_is_sent_to_profile_setup() {
        for s in [ctx(None), ctx(Some((false, false)))] {
            assert_eq!(Surface::home(Some(&s)), Surface::ProfileSetup);
            assert_eq!(Surface::Auth.resolve(Some(&s)), Surface::ProfileSetup);
            assert_eq!(Surface::Level.resolve(Some(&s)), Surface::ProfileSetup);
            assert!(matches!(s.require_onboarded(), Err(Error::OnboardingRequired)));
            assert!(s.require_profile_setup().is_ok());
        }
    }

    #[test]
    fn test_onboarded_user_reaches_game_but_not_setup() {
        let s = ctx(Some((true, false)));
        assert_eq!(Surface::home(Some(&s)), Surface::Game);
        assert_eq!(Surface::ProfileSetup.resolve(Some(&s)), Surface::Game);
        assert_eq!(Surface::Map.resolve(Some(&s)), Surface::Map);
        assert_eq!(Surface::Admin.resolve(Some(&s)), Surface::Game);
        assert!(matches!(s.require_profile_setup(), Err(Error::AlreadyOnboarded)));
        assert!(matches!(s.require_admin(), Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_admin_reaches_admin_surface() {
        let s = ctx(Some((true, true)));
        assert_eq!(Surface::Admin.resolve(Some(&s)), Surface::Admin);
        assert!(s.require_admin().is_ok());
    }
}
