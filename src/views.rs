use axum::{
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::flash::{FlashMessage, Flashes};

/// View model handed to the front-end templates.
#[derive(Debug, Serialize)]
pub struct View<C: Serialize> {
    pub template: &'static str,
    pub title: String,
    pub flashes: Vec<FlashMessage>,
    pub context: C,
}

pub fn render<C: Serialize>(
    status: StatusCode,
    template: &'static str,
    title: impl Into<String>,
    flashes: Flashes,
    context: C,
) -> Response {
    let (messages, clear) = flashes.take();
    let view = View {
        template,
        title: title.into(),
        flashes: messages,
        context,
    };
    let mut res = (status, Json(view)).into_response();
    if let Some(clear) = clear {
        res.headers_mut().append(SET_COOKIE, clear);
    }
    res
}

pub fn page<C: Serialize>(
    template: &'static str,
    title: impl Into<String>,
    flashes: Flashes,
    context: C,
) -> Response {
    render(StatusCode::OK, template, title, flashes, context)
}
