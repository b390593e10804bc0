//! Protocol engine for the SEFAZ-BA consultation flow.
//!
//! The engine walks the portal through its fixed page sequence:
//!
//! 1. load the access-key page and capture its postback tokens
//! 2. fetch a captcha image bound to the session
//! 3. have the [`CaptchaSolver`] answer it
//! 4. submit key and answer, landing on the DANFE page
//! 5. open the tabbed view, then select the products tab
//! 6. parse the NFe and products tabs into a [`Receipt`]
//!
//! Tokens decoded from each response feed the next POST. A rejected captcha
//! restarts from step 1 until `max_captcha_attempts` is reached.

use crate::captcha::{CaptchaChallenge, CaptchaSolution, CaptchaSolver};
use crate::classify::{classify, PortalErrorKind};
use crate::endpoints::{
    Tab, ACCESS_KEY_PAGE, BUTTON_FULL_QUERY, BUTTON_FULL_QUERY_LABEL, BUTTON_TABBED_VIEW,
    BUTTON_TABBED_VIEW_LABEL, CAPTCHA_IMAGE, CAPTCHA_TIMESTAMP_PARAM, DANFE_PAGE,
    FIELD_ACCESS_KEY, FIELD_CALL_ORIGIN, FIELD_CAPTCHA, TABS_PAGE, TAB_CLICK,
};
use crate::error::{Result, ScrapeError};
use crate::form::{form_action, FormBuilder, FormError, FormState};
use crate::transport::{Page, PortalTransport};
use nfce_core::{AccessKey, CoreError, Receipt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Default number of captcha answers tried per run.
pub const DEFAULT_MAX_CAPTCHA_ATTEMPTS: u32 = 5;

const DEFAULT_CAPTCHA_CONTENT_TYPE: &str = "image/gif";

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeState {
    /// Nothing requested yet
    Initial,
    /// Access-key page loaded, tokens held
    AccessKeyPageLoaded,
    /// Captcha image fetched
    CaptchaIssued,
    /// Key and answer accepted, DANFE page held
    Submitted,
    /// Tabbed view opened
    TabsLoaded,
    /// Products tab selected
    ProductsLoaded,
    /// Receipt assembled
    Complete,
    /// The last operation failed
    Error,
}

impl ScrapeState {
    /// `snake_case` name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AccessKeyPageLoaded => "access_key_page_loaded",
            Self::CaptchaIssued => "captcha_issued",
            Self::Submitted => "submitted",
            Self::TabsLoaded => "tabs_loaded",
            Self::ProductsLoaded => "products_loaded",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ScrapeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of the flow, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// GET the access-key page
    LoadAccessKeyPage,
    /// GET the captcha image
    FetchCaptcha,
    /// Wait for the solver
    SolveCaptcha,
    /// POST key and answer
    Submit,
    /// POST the tabbed-view button
    OpenTabs,
    /// POST the products tab button
    SelectProductsTab,
    /// Parse the collected pages
    Assemble,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoadAccessKeyPage => "load_access_key_page",
            Self::FetchCaptcha => "fetch_captcha",
            Self::SolveCaptcha => "solve_captcha",
            Self::Submit => "submit",
            Self::OpenTabs => "open_tabs",
            Self::SelectProductsTab => "select_products_tab",
            Self::Assemble => "assemble",
        })
    }
}

/// Raw bodies kept from a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedPages {
    /// Response to the key submission
    pub danfe: String,
    /// Tabbed view, NFe tab selected
    pub nfe_tab: String,
    /// Tabbed view, products tab selected
    pub products_tab: String,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeResult {
    /// Decoded receipt
    pub receipt: Receipt,
    /// Pages it was decoded from
    pub pages: ScrapedPages,
}

/// Drives one portal session.
///
/// An engine owns its transport, so its cookie jar and tokens are never
/// shared with another run.
pub struct ScrapeEngine<T> {
    transport: T,
    solver: Option<Arc<dyn CaptchaSolver>>,
    max_captcha_attempts: u32,
    form_state: Option<FormState>,
    state: ScrapeState,
}

impl<T> fmt::Debug for ScrapeEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeEngine")
            .field("state", &self.state)
            .field("has_solver", &self.solver.is_some())
            .field("max_captcha_attempts", &self.max_captcha_attempts)
            .finish_non_exhaustive()
    }
}

impl<T: PortalTransport> ScrapeEngine<T> {
    /// Create an engine without a solver.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            solver: None,
            max_captcha_attempts: DEFAULT_MAX_CAPTCHA_ATTEMPTS,
            form_state: None,
            state: ScrapeState::Initial,
        }
    }

    /// Use `solver` for [`ScrapeEngine::fetch_by_access_key`].
    #[must_use]
    pub fn with_solver(mut self, solver: Arc<dyn CaptchaSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Cap the captcha answers tried per run. Zero is treated as one.
    #[must_use]
    pub fn with_max_captcha_attempts(mut self, attempts: u32) -> Self {
        self.max_captcha_attempts = attempts.max(1);
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ScrapeState {
        self.state
    }

    /// Underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Load a fresh access-key page and fetch a challenge for it.
    pub async fn get_captcha(&mut self) -> Result<CaptchaChallenge> {
        let result = async {
            self.load_access_key_page().await?;
            self.fetch_captcha().await
        }
        .await;
        self.settle(result)
    }

    /// Submit a pre-solved answer and collect the receipt.
    ///
    /// Reloads the access-key page first when no tokens are held, in which
    /// case the answer belongs to an older challenge and is likely rejected.
    pub async fn submit_with_captcha(
        &mut self,
        raw_key: &str,
        solution: &CaptchaSolution,
    ) -> Result<ScrapeResult> {
        let result = async {
            let key = parse_key(raw_key)?;
            if !self.form_state.as_ref().is_some_and(FormState::is_valid) {
                tracing::warn!("No session tokens held, reloading the access-key page");
                self.load_access_key_page().await?;
            }
            self.submit_and_collect(&key, solution).await
        }
        .await;
        self.settle(result)
    }

    /// Run the whole flow with the configured solver.
    pub async fn fetch_by_access_key(&mut self, raw_key: &str) -> Result<ScrapeResult> {
        let result = self.run(raw_key).await;
        self.settle(result)
    }

    async fn run(&mut self, raw_key: &str) -> Result<ScrapeResult> {
        let key = parse_key(raw_key)?;
        let solver = self.solver.clone().ok_or(ScrapeError::NoCaptchaSolver)?;

        tracing::info!("Fetching NFC-e {}", key.formatted());

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.load_access_key_page().await?;
            let challenge = self.fetch_captcha().await?;

            tracing::debug!("Waiting for captcha answer (challenge {})", challenge.id);
            let solution = solver.solve(&challenge).await?;

            match self.submit_and_collect(&key, &solution).await {
                Err(e) if e.is_retryable() => {
                    if attempt >= self.max_captcha_attempts {
                        return Err(ScrapeError::CaptchaAttemptsExhausted { attempts: attempt });
                    }
                    tracing::warn!(
                        "Captcha rejected (attempt {}/{}), requesting a new one",
                        attempt,
                        self.max_captcha_attempts
                    );
                }
                other => return other,
            }
        }
    }

    async fn submit_and_collect(
        &mut self,
        key: &AccessKey,
        solution: &CaptchaSolution,
    ) -> Result<ScrapeResult> {
        let danfe = self.submit(key, solution).await?;
        let nfe_tab = self.open_tabs().await?;
        let products_tab = self.select_products_tab().await?;

        let result = assemble(
            key,
            ScrapedPages {
                danfe: danfe.text().into_owned(),
                nfe_tab: nfe_tab.text().into_owned(),
                products_tab: products_tab.text().into_owned(),
            },
        )?;
        self.transition(ScrapeState::Complete);

        tracing::info!(
            "Fetched NFC-e {} with {} items, total {}",
            key.formatted(),
            result.receipt.items.len(),
            result.receipt.total
        );
        Ok(result)
    }

    async fn load_access_key_page(&mut self) -> Result<()> {
        let step = Step::LoadAccessKeyPage;
        self.form_state = None;

        let page = self
            .transport
            .get(ACCESS_KEY_PAGE, &[], None)
            .await
            .map_err(|e| ScrapeError::transport(step, e))?;

        let state =
            FormState::decode_valid(&page.body).map_err(|e| ScrapeError::form_state(step, e))?;

        if let Ok(Some(action)) = form_action(&page.body, "form") {
            let action = action.trim_start_matches("./");
            if !ACCESS_KEY_PAGE.ends_with(action) {
                tracing::warn!("Access-key form now posts to {:?}", action);
            }
        }

        self.form_state = Some(state);
        self.transition(ScrapeState::AccessKeyPageLoaded);
        Ok(())
    }

    async fn fetch_captcha(&mut self) -> Result<CaptchaChallenge> {
        let step = Step::FetchCaptcha;
        let id = chrono::Utc::now().timestamp_millis().to_string();

        let page = self
            .transport
            .get(
                CAPTCHA_IMAGE,
                &[(CAPTCHA_TIMESTAMP_PARAM, id.clone())],
                Some(ACCESS_KEY_PAGE),
            )
            .await
            .map_err(|e| ScrapeError::transport(step, e))?;

        if page.body.is_empty() {
            return Err(ScrapeError::UnexpectedResponse {
                step,
                detail: "empty captcha image".to_string(),
            });
        }

        let content_type = if page.content_type.is_empty() {
            DEFAULT_CAPTCHA_CONTENT_TYPE.to_string()
        } else {
            page.content_type
        };

        self.transition(ScrapeState::CaptchaIssued);
        Ok(CaptchaChallenge {
            id,
            image: page.body,
            content_type,
        })
    }

    async fn submit(&mut self, key: &AccessKey, solution: &CaptchaSolution) -> Result<Page> {
        let fields = FormBuilder::new(self.require_form_state(Step::Submit)?)
            .set(FIELD_ACCESS_KEY, key.as_str())
            .set(FIELD_CAPTCHA, solution.text.as_str())
            .set(BUTTON_FULL_QUERY, BUTTON_FULL_QUERY_LABEL)
            .build();

        let page = self
            .post_back(Step::Submit, ACCESS_KEY_PAGE, &fields)
            .await?;
        self.transition(ScrapeState::Submitted);
        Ok(page)
    }

    async fn open_tabs(&mut self) -> Result<Page> {
        let fields = FormBuilder::new(self.require_form_state(Step::OpenTabs)?)
            .set(BUTTON_TABBED_VIEW, BUTTON_TABBED_VIEW_LABEL)
            .set(FIELD_CALL_ORIGIN, "")
            .build();

        let page = self.post_back(Step::OpenTabs, DANFE_PAGE, &fields).await?;
        self.transition(ScrapeState::TabsLoaded);
        Ok(page)
    }

    async fn select_products_tab(&mut self) -> Result<Page> {
        let (x, y) = TAB_CLICK;
        let fields = FormBuilder::new(self.require_form_state(Step::SelectProductsTab)?)
            .image_button(Tab::Products.button_name(), x, y)
            .set(FIELD_CALL_ORIGIN, "")
            .build();

        let page = self
            .post_back(Step::SelectProductsTab, TABS_PAGE, &fields)
            .await?;
        self.transition(ScrapeState::ProductsLoaded);
        Ok(page)
    }

    /// POST `fields` to `path` and carry the answer's tokens. Only the key
    /// submission is checked for portal error pages.
    async fn post_back(
        &mut self,
        step: Step,
        path: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Page> {
        // Tokens are single-use; a failed POST leaves none behind.
        self.form_state = None;

        let page = self
            .transport
            .post_form(path, fields, Some(path))
            .await
            .map_err(|e| ScrapeError::transport(step, e))?;

        if step == Step::Submit {
            check_submission(&page)?;
        }

        self.form_state = Some(FormState::decode(&page.body));
        Ok(page)
    }

    fn require_form_state(&self, step: Step) -> Result<&FormState> {
        match &self.form_state {
            Some(state) if state.is_valid() => Ok(state),
            _ => Err(ScrapeError::form_state(step, FormError::MissingViewState)),
        }
    }

    fn transition(&mut self, next: ScrapeState) {
        tracing::debug!("Scrape state {} -> {}", self.state, next);
        self.state = next;
    }

    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            tracing::debug!("Scrape failed in state {}: {}", self.state, e);
            self.transition(ScrapeState::Error);
        }
        result
    }
}

fn parse_key(raw: &str) -> Result<AccessKey> {
    AccessKey::parse(raw).map_err(|e| match e {
        CoreError::InvalidAccessKey(reason) => ScrapeError::InvalidAccessKey(reason),
        other => ScrapeError::InvalidAccessKey(other.to_string()),
    })
}

fn check_submission(page: &Page) -> Result<()> {
    let Some(kind) = classify(&page.body) else {
        return Ok(());
    };

    Err(match kind {
        PortalErrorKind::InvalidAccessKey => {
            ScrapeError::InvalidAccessKey("rejected by the portal".to_string())
        }
        PortalErrorKind::InvoiceNotFound => ScrapeError::InvoiceNotFound,
        PortalErrorKind::InvalidCaptcha => ScrapeError::CaptchaInvalid,
        PortalErrorKind::SessionExpired => ScrapeError::SessionExpired,
        PortalErrorKind::Unexpected => ScrapeError::UnexpectedResponse {
            step: Step::Submit,
            detail: "portal error page".to_string(),
        },
    })
}

fn assemble(key: &AccessKey, pages: ScrapedPages) -> Result<ScrapeResult> {
    let mut receipt = nfce_parser::parse_nfe_tab(&pages.nfe_tab)?;

    if receipt.key.is_empty() {
        receipt.key = key.as_str().to_string();
    } else if receipt.key != key.as_str() {
        tracing::warn!(
            "Portal returned key {} for requested key {}",
            receipt.key,
            key.as_str()
        );
    }

    match nfce_parser::parse_products_tab(&pages.products_tab) {
        Ok(items) => receipt.items = items,
        Err(e) => tracing::warn!("Products tab unreadable, returning no items: {}", e),
    }

    Ok(ScrapeResult { receipt, pages })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Page {
        Page {
            status: 200,
            content_type: "text/html".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_check_submission_maps_kinds() {
        assert!(check_submission(&page("<p>DANFE NFC-e</p>")).is_ok());
        assert!(matches!(
            check_submission(&page(r#"<input name="txt_cod_antirobo" />"#)),
            Err(ScrapeError::CaptchaInvalid)
        ));
        assert!(matches!(
            check_submission(&page("<p>NFC-e não encontrada</p>")),
            Err(ScrapeError::InvoiceNotFound)
        ));
        assert!(matches!(
            check_submission(&page("<p>Sessão expirada</p>")),
            Err(ScrapeError::SessionExpired)
        ));
        assert!(matches!(
            check_submission(&page("<p>Chave de acesso inválida</p>")),
            Err(ScrapeError::InvalidAccessKey(_))
        ));
        assert!(matches!(
            check_submission(&page("<p>Ocorreu um erro</p>")),
            Err(ScrapeError::UnexpectedResponse { step: Step::Submit, .. })
        ));
    }

    #[test]
    fn test_parse_key_keeps_reason() {
        let err = parse_key("123").unwrap_err();
        assert_eq!(err.to_string(), "invalid access key: expected 44 digits, got 3");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ScrapeState::AccessKeyPageLoaded.to_string(), "access_key_page_loaded");
        assert_eq!(Step::SelectProductsTab.to_string(), "select_products_tab");
    }
}
