//! Cookie-based session tracking.

use std::sync::Arc;

use http::header::{COOKIE, SET_COOKIE};
use http::HeaderValue;
use portico_core::BoxFuture;

use crate::context::RequestContext;
use crate::session::SessionStore;
use crate::stage::{Next, Stage};
use crate::types::{Failure, Request, Response};

/// Stage that loads a session from the request cookie and writes it back
/// after the handler runs.
///
/// When the request carries no session cookie, or the cookie names an
/// unknown session, a fresh session is created and its id is issued via
/// `Set-Cookie` on successful responses.
pub struct SessionStage {
    store: Arc<SessionStore>,
    cookie_name: String,
}

impl SessionStage {
    /// Creates a session stage backed by the given store.
    #[must_use]
    pub fn new(store: Arc<SessionStore>, cookie_name: String) -> Self {
        Self { store, cookie_name }
    }

    fn session_id_from(&self, request: &Request) -> Option<String> {
        let cookies = request.headers().get(COOKIE)?.to_str().ok()?;
        parse_cookie(cookies, &self.cookie_name)
    }
}

impl Stage for SessionStage {
    fn name(&self) -> &'static str {
        "session"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let existing = self
                .session_id_from(&request)
                .and_then(|id| self.store.get(&id));
            let fresh = existing.is_none();
            let session = match existing {
                Some(session) => session,
                None => self.store.create_session(),
            };
            let session_id = session.id().to_owned();
            ctx.set_session(session);

            let mut result = next.run(ctx, request).await;

            if let Some(session) = ctx.take_session() {
                self.store.put(session);
            }

            if fresh {
                if let Ok(response) = &mut result {
                    let cookie =
                        format!("{}={}; Path=/; HttpOnly", self.cookie_name, session_id);
                    if let Ok(value) = HeaderValue::from_str(&cookie) {
                        response.headers_mut().insert(SET_COOKIE, value);
                    }
                }
            }

            result
        })
    }
}

/// Extracts the value of the named cookie from a `Cookie` header.
fn parse_cookie(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}
