use async_trait::async_trait;
use nfce_core::Brl;
use nfce_scraper::endpoints::{ACCESS_KEY_PAGE, CAPTCHA_IMAGE, DANFE_PAGE, TABS_PAGE};
use nfce_scraper::{
    CallbackSolver, CaptchaChallenge, CaptchaSolution, CaptchaSolver, FormError, Page, PortalTransport,
    ScrapeEngine, ScrapeError, ScrapeState, SolverError, Step, TransportError,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

const KEY: &str = "2925 0306 0572 2303 1484 6501 4000 3829 5911 4107 3162";
const KEY_DIGITS: &str = "29250306057223031484650140003829591141073162";

const ACCESS_PAGE: &str = include_str!("fixtures/consulta_chave.html");
const DANFE: &str = include_str!("fixtures/danfe.html");
const NO_PRODUCTS: &str = include_str!("fixtures/sem_produtos.html");
const ABAS_NFE: &str = include_str!("../../nfce-parser/tests/fixtures/abas_nfe.html");
const ABAS_PRODUTOS: &str = include_str!("../../nfce-parser/tests/fixtures/abas_produtos.html");

const ACCESS_VIEW_STATE: &str = "/wEPDwULLTE0MjY1NTQ4NTQPZBYCAgMPZBYCAgkPDxYCHgdWaXNpYmxlaGRkZA==";
const DANFE_VIEW_STATE: &str = "/wEPDwUKLTg2NzQ1MjM0OGRkDANFE";
const TABS_VIEW_STATE: &str =
    "/wEPDwUKMTY1NDU2MTA1Mg9kFgICAw9kFgQCAQ8PFgIeBFRleHQFLDI5MjUwMzA2MDU3MjIzMDMxNDg0NjUwMTQwMDAzODI5NTkxMTQxMDczMTYyZGRk";

#[derive(Debug, Clone)]
struct Request {
    method: &'static str,
    path: String,
    query: Vec<(String, String)>,
    fields: BTreeMap<String, String>,
    referer: Option<String>,
}

/// Replays canned responses in order and records every request.
#[derive(Clone, Default)]
struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<Page, TransportError>>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<Page, TransportError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: Request) -> Result<Page, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted")
    }
}

#[async_trait]
impl PortalTransport for ScriptedTransport {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
    ) -> Result<Page, TransportError> {
        self.next(Request {
            method: "GET",
            path: path.to_string(),
            query: query.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
            fields: BTreeMap::new(),
            referer: referer.map(str::to_string),
        })
    }

    async fn post_form(
        &self,
        path: &str,
        fields: &BTreeMap<String, String>,
        referer: Option<&str>,
    ) -> Result<Page, TransportError> {
        self.next(Request {
            method: "POST",
            path: path.to_string(),
            query: Vec::new(),
            fields: fields.clone(),
            referer: referer.map(str::to_string),
        })
    }
}

fn html(body: &str) -> Result<Page, TransportError> {
    Ok(Page {
        status: 200,
        content_type: "text/html; charset=utf-8".to_string(),
        body: body.as_bytes().to_vec(),
    })
}

fn raw(body: Vec<u8>) -> Result<Page, TransportError> {
    Ok(Page {
        status: 200,
        content_type: "text/html".to_string(),
        body,
    })
}

fn captcha_image() -> Result<Page, TransportError> {
    Ok(Page {
        status: 200,
        content_type: "image/gif".to_string(),
        body: b"GIF89a\x01\x00\x01\x00".to_vec(),
    })
}

fn happy_script() -> Vec<Result<Page, TransportError>> {
    vec![
        html(ACCESS_PAGE),
        captcha_image(),
        html(DANFE),
        html(ABAS_NFE),
        html(ABAS_PRODUTOS),
    ]
}

/// Answers "abc12" and records the challenge ids it saw.
#[derive(Default)]
struct RecordingSolver {
    seen: Mutex<Vec<String>>,
}

impl RecordingSolver {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptchaSolver for RecordingSolver {
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<CaptchaSolution, SolverError> {
        self.seen.lock().unwrap().push(challenge.id.clone());
        Ok(CaptchaSolution::new("abc12", challenge.id.clone()))
    }
}

#[tokio::test]
async fn test_fetch_by_access_key_full_flow() {
    let transport = ScriptedTransport::new(happy_script());
    let solver = Arc::new(RecordingSolver::default());
    let mut engine = ScrapeEngine::new(transport.clone()).with_solver(solver.clone());

    let result = engine.fetch_by_access_key(KEY).await.expect("fetch");

    assert_eq!(engine.state(), ScrapeState::Complete);
    assert_eq!(result.receipt.key, KEY_DIGITS);
    assert_eq!(result.receipt.total, Brl::from_cents(5335));
    assert_eq!(result.receipt.items.len(), 3);
    assert!(result.pages.danfe.contains("btn_visualizar_abas"));
    assert!(result.pages.nfe_tab.contains("id=\"NFe\""));
    assert!(result.pages.products_tab.contains("id=\"Prod\""));

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);

    assert_eq!((requests[0].method, requests[0].path.as_str()), ("GET", ACCESS_KEY_PAGE));

    let captcha = &requests[1];
    assert_eq!((captcha.method, captcha.path.as_str()), ("GET", CAPTCHA_IMAGE));
    assert_eq!(captcha.referer.as_deref(), Some(ACCESS_KEY_PAGE));
    let seen = solver.seen();
    assert_eq!(captcha.query, vec![("t".to_string(), seen[0].clone())]);
    assert!(seen[0].parse::<i64>().is_ok());

    let submit = &requests[2];
    assert_eq!((submit.method, submit.path.as_str()), ("POST", ACCESS_KEY_PAGE));
    assert_eq!(submit.fields["txt_chave_acesso"], KEY_DIGITS);
    assert_eq!(submit.fields["txt_cod_antirobo"], "abc12");
    assert_eq!(submit.fields["btn_consulta_completa"], "Consultar");
    assert_eq!(submit.fields["__VIEWSTATE"], ACCESS_VIEW_STATE);
    assert_eq!(submit.fields["__VIEWSTATEGENERATOR"], "A1B2C3D4");
    assert_eq!(submit.fields["__EVENTTARGET"], "");

    let tabs = &requests[3];
    assert_eq!((tabs.method, tabs.path.as_str()), ("POST", DANFE_PAGE));
    assert_eq!(tabs.fields["btn_visualizar_abas"], "Visualizar em Abas");
    assert_eq!(tabs.fields["hd_origem_chamada"], "");
    assert_eq!(tabs.fields["__VIEWSTATE"], DANFE_VIEW_STATE);

    let products = &requests[4];
    assert_eq!((products.method, products.path.as_str()), ("POST", TABS_PAGE));
    assert_eq!(products.fields["btn_aba_produtos.x"], "10");
    assert_eq!(products.fields["btn_aba_produtos.y"], "10");
    assert_eq!(products.fields["hd_origem_chamada"], "");
    assert_eq!(products.fields["__VIEWSTATE"], TABS_VIEW_STATE);
}

#[tokio::test]
async fn test_rejected_captcha_requests_a_new_one() {
    let mut script = vec![html(ACCESS_PAGE), captcha_image(), html(ACCESS_PAGE)];
    script.extend(happy_script());
    let transport = ScriptedTransport::new(script);
    let solver = Arc::new(RecordingSolver::default());
    let mut engine = ScrapeEngine::new(transport.clone()).with_solver(solver.clone());

    let result = engine.fetch_by_access_key(KEY).await.expect("fetch after retry");

    assert_eq!(result.receipt.items.len(), 3);
    assert_eq!(solver.seen().len(), 2);
    assert_eq!(transport.requests().len(), 8);
}

#[tokio::test]
async fn test_captcha_attempts_are_bounded() {
    let script = vec![
        html(ACCESS_PAGE),
        captcha_image(),
        html(ACCESS_PAGE),
        html(ACCESS_PAGE),
        captcha_image(),
        html(ACCESS_PAGE),
    ];
    let transport = ScriptedTransport::new(script);
    let mut engine = ScrapeEngine::new(transport.clone())
        .with_solver(Arc::new(RecordingSolver::default()))
        .with_max_captcha_attempts(2);

    let err = engine.fetch_by_access_key(KEY).await.unwrap_err();

    assert!(matches!(err, ScrapeError::CaptchaAttemptsExhausted { attempts: 2 }));
    assert_eq!(engine.state(), ScrapeState::Error);
    assert_eq!(transport.requests().len(), 6);
}

#[tokio::test]
async fn test_invoice_not_found_is_terminal() {
    let script = vec![
        html(ACCESS_PAGE),
        captcha_image(),
        html("<html><body><span id=\"lbl_erro\">NFC-e não encontrada</span></body></html>"),
    ];
    let transport = ScriptedTransport::new(script);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let solver = CallbackSolver::new(move |_challenge: CaptchaChallenge| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok("abc12".to_string()) }
    });
    let mut engine = ScrapeEngine::new(transport.clone()).with_solver(Arc::new(solver));

    let err = engine.fetch_by_access_key(KEY).await.unwrap_err();

    assert!(matches!(err, ScrapeError::InvoiceNotFound));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.state(), ScrapeState::Error);
}

#[tokio::test]
async fn test_missing_solver_fails_before_any_request() {
    let transport = ScriptedTransport::new(happy_script());
    let mut engine = ScrapeEngine::new(transport.clone());

    let err = engine.fetch_by_access_key(KEY).await.unwrap_err();

    assert!(matches!(err, ScrapeError::NoCaptchaSolver));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_key_fails_before_any_request() {
    let transport = ScriptedTransport::new(happy_script());
    let mut engine =
        ScrapeEngine::new(transport.clone()).with_solver(Arc::new(RecordingSolver::default()));

    let err = engine
        .fetch_by_access_key("29250306057223031484650140003829591141073161")
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::InvalidAccessKey(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_access_page_without_view_state_is_fatal() {
    let transport = ScriptedTransport::new(vec![html("<html><body>manutenção</body></html>")]);
    let solver = Arc::new(RecordingSolver::default());
    let mut engine = ScrapeEngine::new(transport).with_solver(solver.clone());

    let err = engine.fetch_by_access_key(KEY).await.unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::FormState {
            step: Step::LoadAccessKeyPage,
            source: FormError::MissingViewState
        }
    ));
    assert!(solver.seen().is_empty());
}

#[tokio::test]
async fn test_missing_products_tab_yields_no_items() {
    let script = vec![
        html(ACCESS_PAGE),
        captcha_image(),
        html(DANFE),
        html(ABAS_NFE),
        html(NO_PRODUCTS),
    ];
    let transport = ScriptedTransport::new(script);
    let mut engine =
        ScrapeEngine::new(transport).with_solver(Arc::new(RecordingSolver::default()));

    let result = engine.fetch_by_access_key(KEY).await.expect("fetch");

    assert!(result.receipt.items.is_empty());
    assert_eq!(result.receipt.total, Brl::from_cents(5335));
    assert_eq!(engine.state(), ScrapeState::Complete);
}

#[tokio::test]
async fn test_transport_failure_is_attributed_to_step() {
    let script = vec![
        html(ACCESS_PAGE),
        Err(TransportError::Status {
            status: 503,
            url: "https://nfe.sefaz.ba.gov.br/captcha".to_string(),
        }),
    ];
    let mut engine = ScrapeEngine::new(ScriptedTransport::new(script))
        .with_solver(Arc::new(RecordingSolver::default()));

    let err = engine.fetch_by_access_key(KEY).await.unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::Transport {
            step: Step::FetchCaptcha,
            source: TransportError::Status { status: 503, .. }
        }
    ));
}

#[tokio::test]
async fn test_solver_cancellation_stops_the_run() {
    let transport = ScriptedTransport::new(happy_script());
    let solver = CallbackSolver::new(|_challenge: CaptchaChallenge| async {
        Err(SolverError::Cancelled)
    });
    let mut engine = ScrapeEngine::new(transport.clone()).with_solver(Arc::new(solver));

    let err = engine.fetch_by_access_key(KEY).await.unwrap_err();

    assert!(matches!(err, ScrapeError::Cancelled));
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_get_captcha_then_submit_with_captcha() {
    let transport = ScriptedTransport::new(happy_script());
    let mut engine = ScrapeEngine::new(transport.clone());

    let challenge = engine.get_captcha().await.expect("challenge");
    assert_eq!(engine.state(), ScrapeState::CaptchaIssued);
    assert_eq!(challenge.content_type, "image/gif");
    assert_eq!(challenge.extension(), "gif");
    assert!(challenge.image.starts_with(b"GIF89a"));

    let solution = CaptchaSolution::new("x7k2p", challenge.id.clone());
    let result = engine
        .submit_with_captcha(KEY, &solution)
        .await
        .expect("submit");

    assert_eq!(result.receipt.key, KEY_DIGITS);
    assert_eq!(engine.state(), ScrapeState::Complete);

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[2].fields["txt_cod_antirobo"], "x7k2p");
}

#[tokio::test]
async fn test_submit_with_captcha_reloads_missing_tokens() {
    let transport = ScriptedTransport::new(vec![
        html(ACCESS_PAGE),
        html(DANFE),
        html(ABAS_NFE),
        html(ABAS_PRODUTOS),
    ]);
    let mut engine = ScrapeEngine::new(transport.clone());

    let solution = CaptchaSolution::new("x7k2p", "0");
    engine
        .submit_with_captcha(KEY, &solution)
        .await
        .expect("submit");

    let requests = transport.requests();
    assert_eq!((requests[0].method, requests[0].path.as_str()), ("GET", ACCESS_KEY_PAGE));
    assert_eq!(requests[1].fields["__VIEWSTATE"], ACCESS_VIEW_STATE);
}

#[tokio::test]
async fn test_latin1_byte_in_tabs_page_does_not_abort() {
    let (head, tail) = ABAS_NFE.split_at(ABAS_NFE.find("<body>").expect("body") + "<body>".len());
    let mut nfe_tab = head.as_bytes().to_vec();
    nfe_tab.extend_from_slice(b"<p>FEIJ\xE3O CARIOCA</p>");
    nfe_tab.extend_from_slice(tail.as_bytes());

    let script = vec![
        html(ACCESS_PAGE),
        captcha_image(),
        html(DANFE),
        raw(nfe_tab),
        html(ABAS_PRODUTOS),
    ];
    let transport = ScriptedTransport::new(script);
    let mut engine =
        ScrapeEngine::new(transport.clone()).with_solver(Arc::new(RecordingSolver::default()));

    let result = engine.fetch_by_access_key(KEY).await.expect("fetch");

    assert_eq!(result.receipt.total, Brl::from_cents(5335));
    assert_eq!(result.receipt.items.len(), 3);
    assert!(result.pages.nfe_tab.contains("FEIJ\u{FFFD}O"));
    assert_eq!(transport.requests()[4].fields["__VIEWSTATE"], TABS_VIEW_STATE);
}

#[tokio::test]
async fn test_error_phrase_in_products_page_still_parses() {
    let products = ABAS_PRODUTOS.replacen(
        "<body>",
        "<body><div class=\"aviso\">Ocorreu um erro ao carregar a logomarca do emitente.</div>",
        1,
    );
    let script = vec![
        html(ACCESS_PAGE),
        captcha_image(),
        html(DANFE),
        html(ABAS_NFE),
        html(&products),
    ];
    let mut engine = ScrapeEngine::new(ScriptedTransport::new(script))
        .with_solver(Arc::new(RecordingSolver::default()));

    let result = engine.fetch_by_access_key(KEY).await.expect("fetch");

    assert_eq!(engine.state(), ScrapeState::Complete);
    assert_eq!(result.receipt.items.len(), 3);
    assert_eq!(result.receipt.items[0].description, "ARROZ BRANCO TIPO 1 5KG");
}
