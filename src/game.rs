//! Browser wiring for one game view: the canvas render loop, click and
//! keyboard input, the WebSocket channel, and the DOM score/status overlays.
//!
//! All mutable state lives in one `GameViewState` held by a thread-local
//! cell. The three callback sites (frame, click, message) each borrow it;
//! the browser guarantees they never run concurrently.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CanvasRenderingContext2d, ErrorEvent, HtmlCanvasElement, MessageEvent, MouseEvent, WebSocket,
    console, window,
};

use crate::protocol::{self, Message, Player};
use crate::school::School;

const CANVAS_WIDTH: u32 = 480;
const CANVAS_HEIGHT: u32 = 240;
const FISH_GLYPH: &str = "🐟";
/// Assumed display refresh rate; simulated time is frame / SIM_HZ.
const SIM_HZ: f64 = 60.0;

/// Which side of the game this page is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Salmon,
    Bear,
}

impl Role {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "salmon" => Some(Role::Salmon),
            "bear" => Some(Role::Bear),
            _ => None,
        }
    }
}

/// Runtime state for the local view. Owned by GAME_STATE; handlers receive
/// it by reference, never through ambient globals.
struct GameViewState {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    socket: WebSocket,
    school: School,
    frame: u64,
    role: Role,
    player: Player,
    /// Bear side: who each live fish belongs to, keyed by nonce, so an eat
    /// can name its target. Pruned as fish are evicted.
    peers: HashMap<String, Player>,
}

thread_local! {
    static GAME_STATE: RefCell<Option<GameViewState>> = const { RefCell::new(None) };
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Connects to the game server, builds the canvas and overlays, installs the
/// input listeners, and starts the frame loop.
pub fn enter_game(name: &str, role: &str) -> Result<(), JsValue> {
    let role = Role::parse(role)
        .ok_or_else(|| JsValue::from_str("role must be \"salmon\" or \"bear\""))?;
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let socket = open_socket(name)?;

    // Create / reuse the 480x240 game canvas with id "c".
    let canvas: HtmlCanvasElement = if let Some(el) = doc.get_element_by_id("c") {
        el.dyn_into()?
    } else {
        let c: HtmlCanvasElement = doc.create_element("canvas")?.dyn_into()?;
        c.set_id("c");
        c.set_attribute("style", "border:1px solid #333; background:#cfe8ff;")
            .ok();
        doc.body()
            .ok_or_else(|| JsValue::from_str("no body"))?
            .append_child(&c)?;
        c
    };
    canvas.set_width(CANVAS_WIDTH);
    canvas.set_height(CANVAS_HEIGHT);
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("no 2d context"))?
        .dyn_into()?;
    ctx.set_font("48px Arial");
    ctx.set_text_align("center");

    // Ensure the score overlay exists.
    if doc.get_element_by_id("points").is_none() {
        if let Some(body) = doc.body() {
            let div = doc.create_element("div")?;
            div.set_id("points");
            div.set_text_content(Some("0"));
            div.set_attribute("style", "font-family:monospace; font-size:18px; margin-top:6px;")
                .ok();
            body.append_child(&div)?;
        }
    }
    // Ensure the status log exists (messages are prepended, newest first).
    if doc.get_element_by_id("status").is_none() {
        if let Some(body) = doc.body() {
            let div = doc.create_element("div")?;
            div.set_id("status");
            div.set_attribute("style", "font-family:monospace; font-size:14px; margin-top:6px;")
                .ok();
            body.append_child(&div)?;
        }
    }

    // Click listener: hit-test in canvas-local coordinates.
    {
        let closure = Closure::wrap(Box::new(move |evt: MouseEvent| {
            let x = evt.offset_x() as f64;
            let y = evt.offset_y() as f64;
            GAME_STATE.with(|cell| {
                if let Some(state) = cell.borrow_mut().as_mut() {
                    handle_click(state, x, y);
                }
            });
        }) as Box<dyn FnMut(_)>);
        canvas.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    // Space bar doubles as the jump button on the salmon side.
    {
        let closure = Closure::wrap(Box::new(move |evt: web_sys::KeyboardEvent| {
            if evt.key() == " " {
                jump();
            }
        }) as Box<dyn FnMut(_)>);
        doc.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    let state = GameViewState {
        canvas,
        ctx,
        socket,
        school: School::new(),
        frame: 0,
        role,
        player: Player::named(name),
        peers: HashMap::new(),
    };
    GAME_STATE.with(|cell| cell.replace(Some(state)));

    start_frame_loop();
    Ok(())
}

/// Salmon action: spawn a locally predicted fish and announce the jump with
/// a fresh nonce so the server's eventual resolution can be matched.
pub fn jump() {
    GAME_STATE.with(|cell| {
        if let Some(state) = cell.borrow_mut().as_mut() {
            if state.role != Role::Salmon {
                return;
            }
            let nonce = protocol::uuid_v4();
            state.school.spawn(Some(nonce.clone()));
            let msg = Message::jump(state.player.clone(), nonce);
            send(&state.socket, &msg);
        }
    });
}

fn open_socket(name: &str) -> Result<WebSocket, JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let host = win.location().host()?;
    let name = name.replace(' ', "_");
    let url = format!("ws://{}/websocket?name={}", host, encode_query(&name));
    let socket = WebSocket::new(&url)?;

    {
        let onopen = Closure::wrap(Box::new(move || {
            console::log_1(&"socket opened".into());
            set_display("entergame", "none");
            set_display("game", "inline");
        }) as Box<dyn FnMut()>);
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();
    }
    {
        let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
            let Some(text) = e.data().as_string() else {
                return;
            };
            match serde_json::from_str::<Message>(&text) {
                Ok(msg) => GAME_STATE.with(|cell| {
                    if let Some(state) = cell.borrow_mut().as_mut() {
                        handle_message(state, msg);
                    }
                }),
                Err(err) => {
                    console::log_1(&format!("ignoring malformed message: {err}").into());
                }
            }
        }) as Box<dyn FnMut(_)>);
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }
    {
        let onerror = Closure::wrap(Box::new(move |e: ErrorEvent| {
            console::log_1(&format!("socket error: {}", e.message()).into());
        }) as Box<dyn FnMut(_)>);
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }

    Ok(socket)
}

fn start_frame_loop() {
    let f: FrameCallback = Rc::new(RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
        GAME_STATE.with(|cell| {
            if let Some(state) = cell.borrow_mut().as_mut() {
                tick(state);
            }
        });
        if let Some(w) = window() {
            let _ = w.request_animation_frame(f.borrow().as_ref().unwrap().as_ref().unchecked_ref());
        }
    }) as Box<dyn FnMut(f64)>));
    if let Some(w) = window() {
        let _ = w.request_animation_frame(g.borrow().as_ref().unwrap().as_ref().unchecked_ref());
    }
}

/// One frame: advance simulated time, draw every fish, then evict. Eviction
/// runs after drawing so a dying fish still shows its final position.
fn tick(state: &mut GameViewState) {
    let t = state.frame as f64 / SIM_HZ;
    state.frame += 1;

    state.ctx.clear_rect(
        0.0,
        0.0,
        state.canvas.width() as f64,
        state.canvas.height() as f64,
    );

    state.school.advance(t);
    for fish in state.school.iter() {
        let Some(pose) = fish.pose() else { continue };
        state.ctx.save();
        state.ctx.translate(pose.x, pose.y).ok();
        state.ctx.rotate(pose.rotation).ok();
        state.ctx.fill_text(FISH_GLYPH, 0.0, 0.0).ok();
        state.ctx.restore();
    }
    state.school.evict(t);

    // Drop peer records whose fish are gone.
    if !state.peers.is_empty() {
        let live: std::collections::HashSet<&str> = state
            .school
            .iter()
            .filter_map(|f| f.nonce.as_deref())
            .collect();
        state.peers.retain(|nonce, _| live.contains(nonce.as_str()));
    }
}

fn handle_message(state: &mut GameViewState, msg: Message) {
    let from_name = msg
        .from
        .as_ref()
        .map(|p| p.name.as_str())
        .unwrap_or("someone");
    match state.role {
        Role::Salmon => {
            // Any resolution retires the predicted fish it names. Unmatched
            // nonces are expected when the fish already expired.
            if !msg.nonce.is_empty() {
                state.school.remove_by_nonce(&msg.nonce);
            }
            if msg.kind == "eat" {
                flash(&format!("You were eaten by {}", escape_html(from_name)));
            } else {
                flash(&format!(
                    "The bear named {} starves tonight.",
                    escape_html(from_name)
                ));
            }
        }
        Role::Bear => {
            if msg.kind == "eat" {
                return; // our own resolution echoed back; nothing to draw
            }
            let nonce = (!msg.nonce.is_empty()).then(|| msg.nonce.clone());
            if let (Some(n), Some(p)) = (nonce.clone(), msg.from.clone()) {
                state.peers.insert(n, p);
            }
            state.school.spawn(nonce);
        }
    }
}

/// Bear resolution strategy injected into the hit test: every struck fish
/// produces an eat message and a point.
fn handle_click(state: &mut GameViewState, x: f64, y: f64) {
    if state.role != Role::Bear {
        return;
    }
    let mut struck: Vec<String> = Vec::new();
    state.school.hit_test(x, y, |fish| {
        struck.push(fish.nonce.clone().unwrap_or_default());
    });
    for nonce in struck {
        let to = state.peers.remove(&nonce).unwrap_or_default();
        let msg = Message::eat(to, nonce);
        send(&state.socket, &msg);
        add_point();
    }
}

fn send(socket: &WebSocket, msg: &Message) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            socket.send_with_str(&json).ok();
        }
        Err(err) => console::log_1(&format!("could not encode message: {err}").into()),
    }
}

// --- DOM helpers -------------------------------------------------------------

fn set_display(id: &str, value: &str) {
    if let Some(doc) = window().and_then(|w| w.document()) {
        if let Some(el) = doc.get_element_by_id(id) {
            el.set_attribute("style", &format!("display:{value};")).ok();
        }
    }
}

/// Prepends a line to the status log under the canvas.
fn flash(msg: &str) {
    if let Some(doc) = window().and_then(|w| w.document()) {
        if let Some(el) = doc.get_element_by_id("status") {
            let prev = el.inner_html();
            el.set_inner_html(&format!("<span>{msg}</span><br>{prev}"));
        }
    }
}

fn add_point() {
    if let Some(doc) = window().and_then(|w| w.document()) {
        if let Some(el) = doc.get_element_by_id("points") {
            let n: i64 = el
                .text_content()
                .unwrap_or_default()
                .trim()
                .parse()
                .unwrap_or(0);
            el.set_text_content(Some(&(n + 1).to_string()));
        }
    }
}

/// Peer names end up in the status log as HTML, so escape them.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encodes a query value; unreserved characters pass through.
fn encode_query(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse() {
        assert_eq!(Role::parse("salmon"), Some(Role::Salmon));
        assert_eq!(Role::parse("bear"), Some(Role::Bear));
        assert_eq!(Role::parse("owl"), None);
    }

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<b>boris & \"friends\"</b>"),
            "&lt;b&gt;boris &amp; &quot;friends&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn encode_query_handles_reserved_bytes() {
        assert_eq!(encode_query("boris_the_bear"), "boris_the_bear");
        assert_eq!(encode_query("a b&c"), "a%20b%26c");
        assert_eq!(encode_query("Bär"), "B%C3%A4r");
    }
}
