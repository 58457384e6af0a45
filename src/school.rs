//! Fish simulation: the entity store, the shared arc trajectory, and click
//! hit-testing. Everything here is pure math over simulated time so it can be
//! exercised by native `cargo test` without a browser.
//!
//! Simulated time is seconds derived from the frame counter (frame / 60), not
//! wall clock, so positions are independent of refresh jitter.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Horizontal speed in canvas units per simulated second (3 px per frame at 60 Hz).
pub const SPEED: f64 = 180.0;
/// Apex of the shared jump arc, in canvas x.
pub const ARC_MID_X: f64 = 240.0;
/// Divisor controlling how flat the arc is.
pub const ARC_CURVATURE: f64 = 300.0;
/// Vertical offset of the arc baseline.
pub const ARC_BASE_Y: f64 = 50.0;
/// Seconds a fish stays alive after it is first drawn.
pub const LIFETIME: f64 = 3.0;
/// Glyph is drawn at 48px, so half of it is 24. Doubles as the strike radius.
pub const HIT_RADIUS: f64 = 24.0;
/// Angular velocity: one half-turn per simulated second.
pub const SPIN_RATE: f64 = PI;

/// Position and rotation of a fish as drawn this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FishPose {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// One animated fish. `origin_time` and `phase` stay unset until the first
/// frame that draws the fish, then never change again.
#[derive(Clone, Debug)]
pub struct Fish {
    pub origin_time: Option<f64>,
    pub current_time: f64,
    pub phase: Option<f64>,
    /// Correlation id linking this fish to a network event ("nonce" on the wire).
    pub nonce: Option<String>,
    /// Last rendered position, consumed by hit-testing.
    pub pos: Option<(f64, f64)>,
    /// Set by a strike; the next eviction pass removes the fish.
    pub marked_for_removal: bool,
}

impl Fish {
    fn new(nonce: Option<String>) -> Self {
        Self {
            origin_time: None,
            current_time: 0.0,
            phase: None,
            nonce,
            pos: None,
            marked_for_removal: false,
        }
    }

    /// Seconds since the fish was first drawn. `None` before the first frame.
    pub fn age(&self) -> Option<f64> {
        self.origin_time.map(|ot| self.current_time - ot)
    }

    /// Pose as of the most recent `advance`. `None` if the fish has never
    /// been rendered, which also excludes it from hit-testing.
    pub fn pose(&self) -> Option<FishPose> {
        let (x, y) = self.pos?;
        let dt = self.current_time - self.origin_time?;
        Some(FishPose {
            x,
            y,
            rotation: rotation(self.phase?, dt),
        })
    }

    /// Center of the rotated glyph. The glyph anchor sits on its text
    /// baseline, so the centroid is offset by half the glyph size
    /// perpendicular to the current rotation. Draw and hit-test must share
    /// this one formula or clicks silently miss.
    pub fn visual_center(&self) -> Option<(f64, f64)> {
        let pose = self.pose()?;
        let angle = pose.rotation + FRAC_PI_2;
        Some((
            pose.x - HIT_RADIUS * angle.cos(),
            pose.y - HIT_RADIUS * angle.sin(),
        ))
    }
}

/// Rotation of a fish `dt` seconds after its first frame.
pub fn rotation(phase: f64, dt: f64) -> f64 {
    phase + dt * SPIN_RATE
}

/// The fixed parametric arc every fish follows, displaced only by spawn time.
pub fn trajectory(dt: f64) -> (f64, f64) {
    let x = dt * SPEED;
    let y = (x - ARC_MID_X).powi(2) / ARC_CURVATURE + ARC_BASE_Y;
    (x, y)
}

/// Owns the set of currently-alive fish for one view.
#[derive(Default)]
pub struct School {
    fish: Vec<Fish>,
}

impl School {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fish> {
        self.fish.iter()
    }

    pub fn len(&self) -> usize {
        self.fish.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fish.is_empty()
    }

    /// Adds a fish with unset origin and phase; it becomes visible (and
    /// hit-testable) on the next `advance`.
    pub fn spawn(&mut self, nonce: Option<String>) -> &mut Fish {
        self.fish.push(Fish::new(nonce));
        self.fish.last_mut().unwrap()
    }

    /// Removes every fish carrying the given correlation id. Silently a no-op
    /// when nothing matches; network races make that an expected case.
    pub fn remove_by_nonce(&mut self, id: &str) {
        self.fish.retain(|f| f.nonce.as_deref() != Some(id));
    }

    /// Per-frame update: lazily initializes origin/phase, then recomputes
    /// every fish's position for simulated time `t`.
    pub fn advance(&mut self, t: f64) {
        for fish in &mut self.fish {
            if fish.origin_time.is_none() {
                fish.origin_time = Some(t);
            }
            if fish.phase.is_none() {
                fish.phase = Some(rand_unit() * TAU);
            }
            fish.current_time = t;
            let dt = t - fish.origin_time.unwrap_or(t);
            fish.pos = Some(trajectory(dt));
        }
    }

    /// Drops fish older than `LIFETIME` or marked by a strike. Runs once per
    /// frame after drawing, so a dying fish is still drawn at its final
    /// position. Fish never drawn (no origin) are kept.
    pub fn evict(&mut self, t: f64) {
        self.fish
            .retain(|f| !f.marked_for_removal && f.origin_time.is_none_or(|ot| t - ot <= LIFETIME));
    }

    /// Tests the click point against every rendered fish; each strike invokes
    /// the caller's handler and marks the fish for removal. Overlapping fish
    /// may all be struck by one click.
    pub fn hit_test(&mut self, cx: f64, cy: f64, mut on_strike: impl FnMut(&Fish)) {
        for fish in &mut self.fish {
            let Some((hx, hy)) = fish.visual_center() else {
                continue; // fish hasn't been drawn yet, also missing critical info
            };
            if ((hx - cx).powi(2) + (hy - cy).powi(2)).sqrt() < HIT_RADIUS {
                on_strike(fish);
                fish.marked_for_removal = true;
            }
        }
    }
}

/// Uniform sample in [0, 1) from the browser's CSPRNG (crypto.getRandomValues
/// via getrandom). Falls back to 0 if the entropy source is unavailable.
fn rand_unit() -> f64 {
    let mut buf = [0u8; 8];
    if getrandom::getrandom(&mut buf).is_err() {
        return 0.0;
    }
    let bits = u64::from_le_bytes(buf) >> 11;
    bits as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    // Builds a fish already rendered at `t` with a fixed phase so geometry is
    // deterministic.
    fn rendered_fish(school: &mut School, origin: f64, phase: f64, t: f64) {
        school.advance(origin);
        for f in &mut school.fish {
            f.phase = Some(phase);
        }
        school.advance(t);
    }

    #[test]
    fn reference_trajectory_numbers() {
        let mut school = School::new();
        school.spawn(None);
        rendered_fish(&mut school, 0.0, 0.0, 1.0);
        let pose = school.iter().next().unwrap().pose().unwrap();
        assert!((pose.x - 180.0).abs() < EPS);
        assert!((pose.y - 62.0).abs() < EPS);
        assert!((pose.rotation - PI).abs() < EPS);
    }

    #[test]
    fn trajectory_is_frame_rate_independent() {
        // Same dt gives the same point regardless of absolute spawn time.
        let (x1, y1) = trajectory(0.5);
        let mut school = School::new();
        school.spawn(None);
        rendered_fish(&mut school, 7.25, 0.0, 7.75);
        let pose = school.iter().next().unwrap().pose().unwrap();
        assert!((pose.x - x1).abs() < EPS);
        assert!((pose.y - y1).abs() < EPS);
    }

    #[test]
    fn evict_at_spawn_time_keeps_fish() {
        let mut school = School::new();
        school.spawn(None);
        school.advance(5.0);
        school.evict(5.0);
        assert_eq!(school.len(), 1);
    }

    #[test]
    fn evict_removes_fish_past_lifetime() {
        let mut school = School::new();
        school.spawn(None);
        school.advance(0.0);
        school.evict(LIFETIME);
        assert_eq!(school.len(), 1, "age exactly at the threshold survives");
        school.advance(LIFETIME + 1.0 / 60.0);
        school.evict(LIFETIME + 1.0 / 60.0);
        assert!(school.is_empty(), "one frame past the threshold is evicted");
    }

    #[test]
    fn never_rendered_fish_survives_eviction() {
        let mut school = School::new();
        school.spawn(None);
        school.evict(100.0);
        assert_eq!(school.len(), 1);
    }

    #[test]
    fn fish_evict_independently() {
        let mut school = School::new();
        school.spawn(Some("early".into()));
        school.advance(0.0);
        school.spawn(Some("late".into()));
        school.advance(1.0);
        school.evict(3.5);
        let alive: Vec<_> = school.iter().filter_map(|f| f.nonce.as_deref()).collect();
        assert_eq!(alive, vec!["late"]);
    }

    #[test]
    fn remove_by_nonce_is_idempotent() {
        let mut school = School::new();
        school.spawn(Some("abc".into()));
        school.spawn(Some("xyz".into()));
        school.remove_by_nonce("abc");
        assert_eq!(school.len(), 1);
        school.remove_by_nonce("abc");
        assert_eq!(school.len(), 1);
        assert_eq!(school.iter().next().unwrap().nonce.as_deref(), Some("xyz"));
    }

    #[test]
    fn marked_fish_removed_on_next_eviction_only() {
        let mut school = School::new();
        school.spawn(None);
        school.advance(0.0);
        let center = school.iter().next().unwrap().visual_center().unwrap();
        let mut strikes = 0;
        school.hit_test(center.0, center.1, |_| strikes += 1);
        assert_eq!(strikes, 1);
        assert_eq!(school.len(), 1, "removal is deferred to the eviction pass");
        school.evict(0.0);
        assert!(school.is_empty());
    }

    #[test]
    fn click_at_visual_center_hits_click_nearby_misses() {
        let mut school = School::new();
        school.spawn(None);
        rendered_fish(&mut school, 0.0, 0.0, 1.0);
        let (cx, cy) = school.iter().next().unwrap().visual_center().unwrap();

        let mut struck = Vec::new();
        school.hit_test(cx + 30.0, cy, |f| struck.push(f.nonce.clone()));
        school.hit_test(cx, cy + 30.0, |f| struck.push(f.nonce.clone()));
        assert!(struck.is_empty(), "30 units off-center is outside the radius");

        school.hit_test(cx, cy, |f| struck.push(f.nonce.clone()));
        assert_eq!(struck.len(), 1);
    }

    #[test]
    fn unrendered_fish_is_never_hit_tested() {
        let mut school = School::new();
        school.spawn(None);
        let mut strikes = 0;
        school.hit_test(0.0, ARC_BASE_Y, |_| strikes += 1);
        assert_eq!(strikes, 0);
    }

    #[test]
    fn overlapping_fish_are_all_struck() {
        let mut school = School::new();
        school.spawn(Some("a".into()));
        school.spawn(Some("b".into()));
        rendered_fish(&mut school, 0.0, 0.0, 1.0);
        let (cx, cy) = school.iter().next().unwrap().visual_center().unwrap();
        let mut struck = Vec::new();
        school.hit_test(cx, cy, |f| struck.push(f.nonce.clone().unwrap()));
        assert_eq!(struck, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn visual_center_matches_draw_rotation_convention() {
        // At dt = 1 with phase 0 the rotation is exactly pi, so the
        // perpendicular offset points straight up from the anchor.
        let mut school = School::new();
        school.spawn(None);
        rendered_fish(&mut school, 0.0, 0.0, 1.0);
        let fish = school.iter().next().unwrap();
        let pose = fish.pose().unwrap();
        let (cx, cy) = fish.visual_center().unwrap();
        assert!((cx - pose.x).abs() < EPS);
        assert!((cy - (pose.y + HIT_RADIUS)).abs() < EPS);
    }
}
