//! Salmon Run client crate.
//!
//! Browser client for the two-player salmon-vs-bear game: salmon jump and
//! hope, bears click fish out of the air. The simulation and hit-test math
//! live in [`school`], the wire schema in [`protocol`], and the canvas /
//! WebSocket / DOM wiring in [`game`].

use wasm_bindgen::prelude::*;

pub mod game;
pub mod protocol;
pub mod school;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Joins the game as `role` ("salmon" or "bear") under the given player name
/// and starts the render loop. Called from the page once the name form is
/// submitted.
#[wasm_bindgen]
pub fn enter_game(name: &str, role: &str) -> Result<(), JsValue> {
    game::enter_game(name, role)
}

/// Salmon-side jump action, wired to the page's jump button (the space bar
/// triggers it too). No-op on the bear side or before `enter_game`.
#[wasm_bindgen]
pub fn jump() {
    game::jump()
}
