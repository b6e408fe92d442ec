use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use chrono::Local;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::export::{self, ExportBundle};
use crate::record;
use crate::roadmap::Catalog;
use crate::schedule::Difficulty;
use crate::store::FileStore;
use crate::tracker::Tracker;

// -- App state --

struct ServerState {
    tracker: Tracker<FileStore>,
    catalog: Catalog,
    notice: Option<String>,
}

type SharedState = Arc<Mutex<ServerState>>;

impl ServerState {
    /// Remembers a failed operation so the next page can show it.
    fn report(&mut self, result: Result<()>) {
        if let Err(e) = result {
            tracing::error!(error = %e, "operation failed");
            self.notice = Some(e.to_string());
        }
    }

    fn total_tasks(&self) -> Option<usize> {
        (!self.catalog.is_empty()).then(|| self.catalog.len())
    }
}

// -- HTML helpers --

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} — rehearse</title>
<style>body{{background:#1e1e1e;color:#d4d4d4}}</style>
<script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-[#1e1e1e] text-[#d4d4d4] font-sans antialiased min-h-screen">
{body}
</body>
</html>"#,
        title = html_escape(title),
        body = body,
    )
}

fn header_bar(crumbs: &[(&str, &str)], actions: &str) -> String {
    let mut parts = String::new();
    for (i, (label, href)) in crumbs.iter().enumerate() {
        if i > 0 {
            parts.push_str(r#"<span class="mx-1.5 text-[#555]">/</span>"#);
        }
        if href.is_empty() {
            parts.push_str(&html_escape(label));
        } else {
            parts.push_str(&format!(
                r#"<a href="{}" class="!text-[#888] no-underline hover:!text-[#bbb]">{}</a>"#,
                html_escape(href),
                html_escape(label),
            ));
        }
    }
    format!(
        r#"<div class="flex items-center justify-between px-6 py-3 border-b border-[#333] bg-[#232323]">
<div class="text-sm text-[#888]">{parts}</div>
<div class="flex gap-2 items-center">{actions}</div>
</div>"#
    )
}

fn notice_html(notice: Option<String>) -> String {
    match notice {
        Some(msg) => format!(
            r#"<div class="mx-6 mt-4 px-4 py-2 rounded-md bg-[#3d2a2a] text-[#e06c6c] text-sm">{}</div>"#,
            html_escape(&msg)
        ),
        None => String::new(),
    }
}

fn btn_primary(href: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" class="inline-flex items-center gap-1.5 px-3.5 py-2 rounded-md text-sm font-medium bg-[#4a90d9] !text-white no-underline hover:bg-[#5a9de6]">{}</a>"#,
        html_escape(href),
        label,
    )
}

fn btn_secondary(href: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" class="inline-flex items-center gap-1.5 px-3.5 py-2 rounded-md text-sm font-medium bg-[#383838] !text-[#ccc] border border-[#444] no-underline hover:bg-[#444] hover:!text-[#e0e0e0]">{}</a>"#,
        html_escape(href),
        label,
    )
}

fn task_row(id: &str, title: &str, done: bool) -> String {
    let (mark, cls) = if done {
        ("&#10003;", "text-[#6bc06b] line-through")
    } else {
        ("&nbsp;", "text-[#d4d4d4]")
    };
    format!(
        r#"<form method="post" action="/task/toggle" class="m-0"><input type="hidden" name="id" value="{id}"><button type="submit" class="w-full flex items-center gap-3 py-2 px-3 bg-[#2a2a2a] rounded-md text-left text-[0.9rem] cursor-pointer hover:bg-[#333]"><span class="inline-flex w-5 h-5 items-center justify-center border border-[#555] rounded text-[#6bc06b]">{mark}</span><span class="{cls}">{title}</span></button></form>"#,
        id = html_escape(id),
        title = html_escape(title),
    )
}

// -- Route handlers --

async fn index(State(state): State<SharedState>) -> Html<String> {
    let mut st = state.lock().await;
    let notice = st.notice.take();
    let summary = st.tracker.summary(st.total_tasks());
    let streak = st.tracker.streak().count;
    let due = st.tracker.due(record::now()).len();

    let review_btn = if due > 0 {
        btn_primary("/review", &format!("Review {due} due"))
    } else {
        String::new()
    };
    let actions = format!("{review_btn}{}", btn_secondary("/export", "Export"));

    let mut tasks = String::new();
    if st.catalog.is_empty() {
        if st.tracker.progress().is_empty() {
            tasks.push_str(
                r#"<p class="text-center text-[#666] py-12">No roadmap loaded. Start with <code>--roadmap</code>.</p>"#,
            );
        } else {
            tasks.push_str(r#"<div class="flex flex-col gap-1">"#);
            for (id, done) in st.tracker.progress().iter() {
                tasks.push_str(&task_row(id, id, *done));
            }
            tasks.push_str("</div>");
        }
    } else {
        for phase in st.catalog.phases() {
            tasks.push_str(&format!(
                r#"<h3 class="text-[0.65rem] uppercase tracking-widest text-[#666] mt-6 mb-2">{}</h3><div class="flex flex-col gap-1">"#,
                html_escape(phase)
            ));
            for task in st.catalog.tasks.iter().filter(|t| t.phase == phase) {
                tasks.push_str(&task_row(
                    &task.id,
                    &task.title,
                    st.tracker.is_completed(&task.id),
                ));
            }
            tasks.push_str("</div>");
        }
    }

    let stat = |label: &str, value: String| {
        format!(
            r#"<div class="bg-[#2d2d2d] border border-[#3a3a3a] rounded-lg px-4 py-3"><div class="text-xs text-[#888]">{label}</div><div class="text-xl font-semibold text-[#e0e0e0]">{value}</div></div>"#
        )
    };

    let body = format!(
        r#"{header}
{notice}
<div class="p-6 max-w-3xl">
<div class="grid grid-cols-4 gap-3 mb-4">{progress}{retention}{streak}{due}</div>
<div class="h-2 bg-[#333] rounded-full overflow-hidden mb-6"><div class="h-full bg-[#4a90d9]" style="width:{pct}%"></div></div>
{tasks}
<form method="post" action="/import" class="mt-10">
<label class="block text-xs font-medium text-[#888] mb-1" for="data">Import exported JSON</label>
<textarea id="data" name="data" rows="3" class="w-full px-3 py-2.5 border border-[#444] rounded-md text-[0.8rem] bg-[#383838] text-[#e0e0e0]"></textarea>
<button type="submit" class="mt-2 inline-flex items-center px-3.5 py-2 rounded-md text-sm font-medium bg-[#383838] text-[#ccc] border border-[#444] cursor-pointer hover:bg-[#444]">Import</button>
</form>
</div>"#,
        header = header_bar(&[("Roadmap", "")], &actions),
        notice = notice_html(notice),
        progress = stat("Progress", format!("{}%", summary.percentage)),
        retention = stat("Retention", format!("{}%", summary.retention_score)),
        streak = stat("Streak", format!("{streak} days")),
        due = stat("Reviews due", due.to_string()),
        pct = summary.percentage,
        tasks = tasks,
    );
    Html(page("Roadmap", &body))
}

// Task ids come from user-written CSV files and may hold any character, so
// they travel in form bodies rather than in the path.

#[derive(serde::Deserialize)]
struct TaskForm {
    id: String,
}

#[derive(serde::Deserialize)]
struct ReviewForm {
    id: String,
    #[serde(default)]
    difficulty: String,
}

async fn toggle_task(State(state): State<SharedState>, Form(form): Form<TaskForm>) -> Redirect {
    let mut st = state.lock().await;
    let result = st.tracker.toggle(&form.id, record::now()).map(|_| ());
    st.report(result);
    Redirect::to("/")
}

async fn review_page(State(state): State<SharedState>) -> Html<String> {
    let mut st = state.lock().await;
    let notice = st.notice.take();
    let items = st.tracker.due_items(&st.catalog, record::now());

    let mut rows = String::new();
    if items.is_empty() {
        rows.push_str(
            r#"<p class="text-center text-[#666] py-12">No reviews due today. Great job staying on top of your learning!</p>"#,
        );
    }
    for item in &items {
        rows.push_str(&format!(
            r#"<div class="bg-[#2d2d2d] border border-[#3a3a3a] rounded-xl p-5 mb-3">
<div class="text-[0.95rem] font-medium text-[#e0e0e0]">{title}</div>
<div class="text-sm text-[#888] mt-1">{desc}</div>
<form method="post" action="/review" class="flex gap-3 mt-4 m-0">
<input type="hidden" name="id" value="{id}">
<button type="submit" name="difficulty" value="easy" class="px-4 py-1.5 rounded-md text-sm cursor-pointer bg-[#333] text-[#6bc06b] hover:bg-[#2a3d2a]">Easy</button>
<button type="submit" name="difficulty" value="medium" class="px-4 py-1.5 rounded-md text-sm cursor-pointer bg-[#333] text-[#d4a05a] hover:bg-[#3d3425]">Medium</button>
<button type="submit" name="difficulty" value="hard" class="px-4 py-1.5 rounded-md text-sm cursor-pointer bg-[#333] text-[#e06c6c] hover:bg-[#3d2a2a]">Hard</button>
</form>
</div>"#,
            title = html_escape(&item.info.title),
            desc = html_escape(&item.info.description),
            id = html_escape(&item.task_id),
        ));
    }

    let body = format!(
        r#"{header}
{notice}
<div class="p-6 max-w-2xl">{rows}</div>"#,
        header = header_bar(&[("Roadmap", "/"), ("Review", "")], ""),
        notice = notice_html(notice),
        rows = rows,
    );
    Html(page("Review", &body))
}

async fn review_submit(
    State(state): State<SharedState>,
    Form(form): Form<ReviewForm>,
) -> Redirect {
    let mut st = state.lock().await;
    let result = form.difficulty.parse::<Difficulty>().and_then(|difficulty| {
        st.tracker
            .record_review(&form.id, difficulty, record::now())
            .map(|_| ())
    });
    st.report(result);
    Redirect::to("/review")
}

async fn export_download(State(state): State<SharedState>) -> Response {
    let mut st = state.lock().await;
    let json = st.tracker.export(record::now()).to_json();
    export_response(&mut st, json)
}

/// Sends the file, or goes back to the dashboard with the error shown.
fn export_response(st: &mut ServerState, json: Result<String>) -> Response {
    let json = match json {
        Ok(json) => json,
        Err(e) => {
            st.report(Err(e));
            return Redirect::to("/").into_response();
        }
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::file_name(Local::now().date_naive())
    );
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        json,
    )
        .into_response()
}

#[derive(serde::Deserialize)]
struct ImportForm {
    data: String,
}

async fn import_submit(State(state): State<SharedState>, Form(form): Form<ImportForm>) -> Redirect {
    let mut st = state.lock().await;
    let result = ExportBundle::from_json(&form.data).and_then(|bundle| st.tracker.import(bundle));
    st.report(result);
    Redirect::to("/")
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/task/toggle", post(toggle_task))
        .route("/review", get(review_page).post(review_submit))
        .route("/export", get(export_download))
        .route("/import", post(import_submit))
        .with_state(state)
}

// -- Public entry point --

pub async fn serve(tracker: Tracker<FileStore>, catalog: Catalog, port: u16) -> Result<()> {
    let state = Arc::new(Mutex::new(ServerState {
        tracker,
        catalog,
        notice: None,
    }));

    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("serving at http://localhost:{port}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
