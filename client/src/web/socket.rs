use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use plotcanvas_shared::{ClientMessage, ServerMessage};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use crate::engine::NetworkEvent;
use crate::error::TransportError;
use crate::sync::Transport;

/// Network results waiting for the next engine tick.
pub type Inbox = Rc<RefCell<VecDeque<NetworkEvent>>>;

struct Socket {
    ws: WebSocket,
    _on_open: Closure<dyn Fn()>,
    _on_close: Closure<dyn Fn(CloseEvent)>,
    _on_message: Closure<dyn Fn(MessageEvent)>,
}

impl Socket {
    fn close(self) {
        self.ws.set_onopen(None);
        self.ws.set_onclose(None);
        self.ws.set_onmessage(None);
        let _ = self.ws.close();
    }
}

/// [`Transport`] over a browser WebSocket. Callbacks only push into the
/// shared inbox; the engine reads it between frames.
pub struct WsTransport {
    url: String,
    inbox: Inbox,
    socket: Option<Socket>,
}

impl WsTransport {
    pub fn new(url: String, inbox: Inbox) -> Self {
        Self {
            url,
            inbox,
            socket: None,
        }
    }
}

/// `ws(s)://<host><path>?user=<id>` for the current page.
pub fn socket_url(path: &str, user: Option<&str>) -> String {
    let location = web_sys::window().map(|window| window.location());
    let secure = location
        .as_ref()
        .and_then(|location| location.protocol().ok())
        .is_some_and(|protocol| protocol == "https:");
    let host = location
        .as_ref()
        .and_then(|location| location.host().ok())
        .unwrap_or_default();
    let scheme = if secure { "wss" } else { "ws" };
    match user {
        Some(user) => format!("{scheme}://{host}{path}?user={}", js_sys::encode_uri_component(user)),
        None => format!("{scheme}://{host}{path}"),
    }
}

impl Transport for WsTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if let Some(old) = self.socket.take() {
            old.close();
        }
        let ws = WebSocket::new(&self.url).map_err(|err| TransportError::Open(format!("{err:?}")))?;

        let inbox = self.inbox.clone();
        let on_open = Closure::<dyn Fn()>::new(move || {
            inbox.borrow_mut().push_back(NetworkEvent::Connected);
        });
        let inbox = self.inbox.clone();
        let on_close = Closure::<dyn Fn(CloseEvent)>::new(move |event: CloseEvent| {
            tracing::debug!(code = event.code(), "socket closed");
            inbox.borrow_mut().push_back(NetworkEvent::Disconnected);
        });
        let inbox = self.inbox.clone();
        let on_message = Closure::<dyn Fn(MessageEvent)>::new(move |event: MessageEvent| {
            let Some(text) = event.data().as_string() else {
                return;
            };
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(message) => inbox.borrow_mut().push_back(NetworkEvent::Message(message)),
                Err(err) => tracing::warn!(%err, "dropping malformed frame"),
            }
        });

        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        self.socket = Some(Socket {
            ws,
            _on_open: on_open,
            _on_close: on_close,
            _on_message: on_message,
        });
        Ok(())
    }

    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        if socket.ws.ready_state() != WebSocket::OPEN {
            return Err(TransportError::NotConnected);
        }
        let text = serde_json::to_string(message)?;
        socket
            .ws
            .send_with_str(&text)
            .map_err(|err| TransportError::Send(format!("{err:?}")))
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
    }
}
