//! Response shaping: full page vs. partial fragment, and flash redirects.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use claims_core::Message;
use serde::Serialize;

pub const MESSAGE_LEVEL_HEADER: &str = "x-message-level";
pub const MESSAGE_HEADER: &str = "x-message";

/// Whether the client asked for a fragment (`HX-Request` present) or a full page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Full,
    Fragment,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RenderMode {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(if parts.headers.contains_key("hx-request") {
            Self::Fragment
        } else {
            Self::Full
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Rendered<T> {
    pub view: &'static str,
    pub fragment: bool,
    pub context: T,
}

impl<T: Serialize> Rendered<T> {
    pub fn page(view: &'static str, context: T) -> Json<Self> {
        Json(Self {
            view,
            fragment: false,
            context,
        })
    }

    pub fn fragment(view: &'static str, context: T) -> Json<Self> {
        Json(Self {
            view,
            fragment: true,
            context,
        })
    }
}

impl RenderMode {
    pub fn is_fragment(self) -> bool {
        self == Self::Fragment
    }

    /// Pick the view for this mode and wrap the context.
    pub fn render<T: Serialize>(
        self,
        full_view: &'static str,
        fragment_view: &'static str,
        context: T,
    ) -> Json<Rendered<T>> {
        Json(Rendered {
            view: if self.is_fragment() { fragment_view } else { full_view },
            fragment: self.is_fragment(),
            context,
        })
    }
}

/// 303 to `location` with the flash message in response headers.
pub fn redirect_with_message(location: &str, message: &Message) -> Response {
    let mut response = Redirect::to(location).into_response();
    let headers = response.headers_mut();
    headers.insert(
        MESSAGE_LEVEL_HEADER,
        HeaderValue::from_static(message.level.as_str()),
    );
    match HeaderValue::from_str(&message.text) {
        Ok(value) => {
            headers.insert(MESSAGE_HEADER, value);
        }
        Err(_) => tracing::debug!("Flash message not representable as a header"),
    }
    response
}

pub fn claim_detail_path(claim_id: i64) -> String {
    format!("/claim/{}/", claim_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::LOCATION, StatusCode};

    #[test]
    fn fragment_view_is_selected() {
        let Json(rendered) = RenderMode::Fragment.render("claims/list", "claims/table_partial", 1);
        assert_eq!(rendered.view, "claims/table_partial");
        assert!(rendered.fragment);
        let Json(rendered) = RenderMode::Full.render("claims/list", "claims/table_partial", 1);
        assert_eq!(rendered.view, "claims/list");
    }

    #[test]
    fn flash_redirect_carries_message() {
        let resp = redirect_with_message("/claim/7/", &Message::success("Note added successfully!"));
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), "/claim/7/");
        assert_eq!(resp.headers().get(MESSAGE_LEVEL_HEADER).unwrap(), "success");
        assert_eq!(resp.headers().get(MESSAGE_HEADER).unwrap(), "Note added successfully!");
    }
}
