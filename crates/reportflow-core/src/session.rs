//! Session Bootstrap: log in, pick an operator role, reach the report view.

use reportflow_browser::ReportPage;
use std::fmt;
use tracing::{info, warn};

use crate::error::{ExtractionError, Result};
use crate::models::{AssignmentMode, FilterAssignment};
use crate::profile::SiteProfile;
use crate::setter::ValueSetter;

#[derive(Clone)]
pub struct Credentials {
    pub login_url: String,
    pub username: String,
    pub password: String,
    /// Operator role to choose after login, when the site asks for one.
    pub role: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}

pub struct SessionBootstrap<'a> {
    page: &'a dyn ReportPage,
    profile: &'a SiteProfile,
}

impl<'a> SessionBootstrap<'a> {
    pub fn new(page: &'a dyn ReportPage, profile: &'a SiteProfile) -> Self {
        Self { page, profile }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        let login = &self.profile.login;
        self.page.goto(&credentials.login_url).await?;
        self.page.wait_for_load().await?;

        if self.page.exists(&login.username_selector).await? {
            self.page
                .fill_selector(&login.username_selector, &credentials.username)
                .await?;
            self.page
                .fill_selector(&login.password_selector, &credentials.password)
                .await?;
            self.page.click(&login.submit_selector).await?;
            self.page.wait_for_load().await?;
            info!(user = %credentials.username, "Logged in");
        } else {
            info!("No login form; assuming an existing session");
        }

        if let (Some(role), Some(field)) = (&credentials.role, &login.role_field) {
            let mut assignment =
                FilterAssignment::new(field.clone(), AssignmentMode::ExactValue(role.clone()));
            match ValueSetter::assign(self.page, &mut assignment).await {
                Ok(_) => {
                    info!(role = %role, "Operator role selected");
                    if let Some(selector) = &login.role_continue_selector
                        && self.page.exists(selector).await?
                    {
                        self.page.click(selector).await?;
                        self.page.wait_for_load().await?;
                    }
                }
                Err(ExtractionError::ControlNotFound { .. }) if !field.required => {
                    warn!(role = %role, "Role selector not present; continuing");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Click through the navigation steps to the report view.
    pub async fn open_report_view(&self) -> Result<()> {
        for selector in &self.profile.navigation {
            self.page.click(selector).await?;
            self.page.wait_for_load().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixturePage;

    fn credentials(role: Option<&str>) -> Credentials {
        Credentials {
            login_url: "https://works.example/login".to_string(),
            username: "operator".to_string(),
            password: "secret".to_string(),
            role: role.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn fills_login_form_and_navigates() {
        let profile = SiteProfile::builtin();
        let page = FixturePage::new().with_selector("input[name='username']");
        let session = SessionBootstrap::new(&page, &profile);

        session.login(&credentials(None)).await.unwrap();
        session.open_report_view().await.unwrap();

        assert_eq!(
            page.actions(),
            vec![
                "goto https://works.example/login",
                "fill input[name='username'] operator",
                "fill input[name='password'] secret",
                "click button[type='submit']",
                "click text=Reports",
                "click text=Work Status Report",
            ]
        );
    }

    #[tokio::test]
    async fn skips_form_when_already_logged_in() {
        let profile = SiteProfile::builtin();
        let page = FixturePage::new();

        SessionBootstrap::new(&page, &profile)
            .login(&credentials(None))
            .await
            .unwrap();
        assert_eq!(page.actions(), vec!["goto https://works.example/login"]);
    }

    #[tokio::test]
    async fn selects_operator_role() {
        let profile = SiteProfile::builtin();
        let page = FixturePage::new()
            .with_native("role", "Role", &["Clerk", "Executive Engineer"])
            .with_selector("text=Continue");

        SessionBootstrap::new(&page, &profile)
            .login(&credentials(Some("Executive Engineer")))
            .await
            .unwrap();

        let role = page.control("role").unwrap();
        assert_eq!(role.selected_texts(), vec!["Executive Engineer".to_string()]);
        assert!(page.actions().contains(&"click text=Continue".to_string()));
    }

    #[tokio::test]
    async fn optional_role_selector_may_be_missing() {
        let profile = SiteProfile::builtin();
        let page = FixturePage::new();

        SessionBootstrap::new(&page, &profile)
            .login(&credentials(Some("Clerk")))
            .await
            .unwrap();
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", credentials(None));
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("secret"));
    }
}
