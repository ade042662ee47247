//! Browser form served with axum.
//!
//! One page: language selector, topic, slide count, optional content analysis,
//! optional custom titles and a generate action that answers with a data-URI
//! download link. Each browser gets its own [`Session`] through a cookie.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::analysis::Analysis;
use crate::download;
use crate::language::{Languages, Texts};
use crate::pipeline::{Pipeline, MAX_SLIDES, MIN_SLIDES};
use crate::session::{FormInputs, Session, SessionStore};

const SESSION_COOKIE: &str = "decksmith_session";

/// Shared server state
pub struct AppState {
    pub pipeline: Pipeline,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(pipeline: Pipeline, sessions: SessionStore) -> Self {
        Self { pipeline, sessions }
    }

    /// Live session for the request's cookie.
    fn known_session(&self, headers: &HeaderMap) -> Option<(Uuid, Session)> {
        let id = session_id(headers)?;
        self.sessions.get(&id).map(|session| (id, session))
    }

    /// Live session for the request's cookie, or an unsaved fresh one
    fn session(&self, headers: &HeaderMap) -> (Uuid, Session) {
        self.known_session(headers).unwrap_or_else(|| {
            let id = Uuid::new_v4();
            tracing::debug!(session = %id, live = self.sessions.len(), "new session");
            (id, Session::default())
        })
    }
}

/// Routes for the form
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/generate", post(generate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the form until the process is stopped
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving presentation form");
    axum::serve(listener, router(state)).await
}

#[derive(Debug, Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

/// What to show under the form
enum Notice<'a> {
    None,
    Analysis(&'a Analysis),
    Warning(String),
    Error(String),
    Download(String),
}

/// Renders the form. Only an existing session is updated; a first visit
/// stores nothing.
async fn index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LangQuery>,
) -> Response {
    match state.known_session(&headers) {
        Some((id, mut session)) => {
            if let Some(lang) = query.lang {
                session.inputs.lang = lang.clone();
                state.sessions.update(id, |stored| stored.inputs.lang = lang);
            }
            with_cookie(id, page(&state, &session, Notice::None)).into_response()
        }
        None => {
            let mut session = Session::default();
            if let Some(lang) = query.lang {
                session.inputs.lang = lang;
            }
            Html(page(&state, &session, Notice::None)).into_response()
        }
    }
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(inputs): Form<FormInputs>,
) -> impl IntoResponse {
    let (id, mut session) = state.session(&headers);
    session.inputs = inputs;

    let result = state.pipeline.analyze(&mut session).await;
    let ran = matches!(result, Ok(true));
    let inputs = session.inputs.clone();
    let analysis = session.analysis.clone();
    state.sessions.update(id, move |stored| {
        stored.inputs = inputs;
        if ran {
            stored.analysis = analysis;
        }
    });

    let page = match result {
        Ok(true) => match session.analysis.as_ref() {
            Some(analysis) => page(&state, &session, Notice::Analysis(analysis)),
            None => page(&state, &session, Notice::None),
        },
        Ok(false) => page(&state, &session, Notice::None),
        Err(e) => {
            let message = match state.pipeline.texts_for(&session) {
                Ok(texts) => e.user_message(texts),
                Err(_) => e.to_string(),
            };
            page(&state, &session, Notice::Error(message))
        }
    };
    with_cookie(id, page)
}

async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(inputs): Form<FormInputs>,
) -> impl IntoResponse {
    let (id, mut session) = state.session(&headers);
    session.inputs = inputs;

    let notice = match (
        state.pipeline.texts_for(&session),
        state.pipeline.generate(&session).await,
    ) {
        (Ok(texts), Ok(generated)) => match download::download_link(&generated.path, &texts.download) {
            Ok(link) => Notice::Download(link),
            Err(e) => Notice::Error(format!("{}: {}", texts.error, e)),
        },
        (Ok(texts), Err(e)) if e.is_no_topic() => Notice::Warning(e.user_message(texts)),
        (Ok(texts), Err(e)) => Notice::Error(e.user_message(texts)),
        (Err(e), _) => Notice::Error(e.to_string()),
    };

    // An analysis stored meanwhile by another request is kept.
    let inputs = session.inputs.clone();
    state.sessions.update(id, move |stored| stored.inputs = inputs);

    let page = page(&state, &session, notice);
    with_cookie(id, page)
}

fn with_cookie(id: Uuid, page: String) -> impl IntoResponse {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    ([(SET_COOKIE, cookie)], Html(page))
}

/// Session id from the request's `Cookie` header
fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

fn page(state: &AppState, session: &Session, notice: Notice<'_>) -> String {
    let languages = state.pipeline.languages();
    match state.pipeline.texts_for(session) {
        Ok(texts) => render_page(languages, texts, session, &notice),
        Err(e) => {
            // Unknown language in the query string: show the default one.
            let fallback = Session {
                inputs: FormInputs {
                    lang: languages.default_code().to_string(),
                    ..session.inputs.clone()
                },
                analysis: session.analysis.clone(),
            };
            match languages.get(languages.default_code()) {
                Ok(texts) => render_page(
                    languages,
                    texts,
                    &fallback,
                    &Notice::Error(e.to_string()),
                ),
                Err(e) => format!("<p>{}</p>", text(&e.to_string())),
            }
        }
    }
}

fn render_page(languages: &Languages, texts: &Texts, session: &Session, notice: &Notice<'_>) -> String {
    let inputs = &session.inputs;
    let selected = if inputs.lang.is_empty() {
        languages.default_code()
    } else {
        inputs.lang.as_str()
    };
    let slide_count = inputs.slide_count.clamp(MIN_SLIDES, MAX_SLIDES);

    let mut html = String::with_capacity(8192);
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>{}</title>", text(&texts.title)));
    html.push_str(
        "<style>body{font-family:sans-serif;max-width:760px;margin:2em auto;}\
         h1{color:orange;text-align:center;}h3{color:pink;text-align:center;}\
         textarea,input[type=text]{width:100%;}label{display:block;margin-top:1em;}\
         .warning{color:#b8860b;}.error{color:#c00;}.success{color:#080;}</style>",
    );
    html.push_str("</head><body>");

    html.push_str("<form method=\"post\" action=\"/generate\">");
    html.push_str("<label>Select Language / 选择语言 / เลือกภาษา ");
    html.push_str(
        "<select name=\"lang\" onchange=\"location.href='/?lang='+encodeURIComponent(this.value)\">",
    );
    for code in languages.codes() {
        let marker = if code == selected { " selected" } else { "" };
        html.push_str(&format!(
            "<option value=\"{}\"{marker}>{}</option>",
            attr(code),
            text(code)
        ));
    }
    html.push_str("</select></label>");

    html.push_str(&format!("<h1>{}</h1>", text(&texts.title)));
    html.push_str(&format!("<h3>{}</h3>", text(&texts.subtitle)));

    html.push_str(&format!(
        "<label>{}<input type=\"text\" name=\"topic\" value=\"{}\"></label>",
        text(&texts.topic_prompt),
        attr(&inputs.topic)
    ));
    html.push_str(&format!(
        "<label>{} <output id=\"count\">{slide_count}</output>\
         <input type=\"range\" name=\"slide_count\" min=\"{MIN_SLIDES}\" max=\"{MAX_SLIDES}\" \
         value=\"{slide_count}\" oninput=\"document.getElementById('count').value=this.value\"></label>",
        text(&texts.slide_count)
    ));

    html.push_str(&format!(
        "<details{}><summary>{}</summary>",
        if inputs.analysis_content.is_empty() { "" } else { " open" },
        text(&texts.content_analysis)
    ));
    html.push_str(&format!(
        "<label>{}<textarea name=\"analysis_content\" rows=\"6\" placeholder=\"{}\">{}</textarea></label>",
        text(&texts.content_analysis_prompt),
        attr(&texts.content_analysis_placeholder),
        text(&inputs.analysis_content)
    ));
    html.push_str(&format!(
        "<button type=\"submit\" formaction=\"/analyze\">{}</button>",
        text(&texts.analyze_button)
    ));
    if let Notice::Analysis(analysis) = notice {
        html.push_str(&format!(
            "<p class=\"success\">{}</p><h4>{}</h4><p>{}</p><h4>{}</h4><p>{}</p>",
            text(&texts.analysis_complete),
            text(&texts.key_themes),
            text(&analysis.themes.join(", ")),
            text(&texts.recommendations),
            text(&analysis.recommendations)
        ));
    }
    html.push_str("</details>");

    html.push_str(&format!(
        "<details{}><summary>{}</summary>",
        if inputs.custom_titles.is_empty() { "" } else { " open" },
        text(&texts.custom_slides)
    ));
    html.push_str(&format!(
        "<textarea name=\"custom_titles\" rows=\"6\" placeholder=\"{}\">{}</textarea>",
        attr(&texts.custom_placeholder),
        text(&inputs.custom_titles)
    ));
    html.push_str("</details>");

    html.push_str(&format!(
        "<p><button type=\"submit\" title=\"{}\">{}</button></p>",
        attr(&texts.generating),
        text(&texts.generate_btn)
    ));
    html.push_str("</form>");

    match notice {
        Notice::None | Notice::Analysis(_) => {}
        Notice::Warning(message) => {
            html.push_str(&format!("<p class=\"warning\">{}</p>", text(message)));
        }
        Notice::Error(message) => {
            html.push_str(&format!("<p class=\"error\">{}</p>", text(message)));
        }
        Notice::Download(link) => {
            html.push_str(&format!(
                "<p class=\"success\">{}</p><p>{link}</p>",
                text(&texts.success)
            ));
        }
    }

    html.push_str("</body></html>");
    html
}
