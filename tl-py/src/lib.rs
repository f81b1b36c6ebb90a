//! Python bindings for the tl-core prediction engine.
//!
//! Provides a simple Python API:
//!
//! ```python
//! from touchline_predict import PredictionEngine, Vec3
//!
//! engine = PredictionEngine.from_profile("profiles", "high_latency")
//! engine.update_latency(120.0, 8.0)
//! engine.apply_kick_prediction(Vec3(8.0, 4.0, 0.0), None, now_ms)
//!
//! players = [("me", (1.0, 0.22, 0.0), (0.0, 0.0, 0.0), 0.5, False)]
//! engine.update(1 / 60, now_ms, players, "me")
//! pos = engine.visual_position()
//! ```

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use tl_core::contact::ContactPhase;
use tl_core::engine::{PredictionEngine as CoreEngine, ReconcileOutcome};
use tl_core::profiles::{ProfileError, ProfileLoader};
use tl_core::types::{PlayerInfo, ServerUpdate, Vec3 as CoreVec3};

/// 3D vector for positions, velocities, impulses.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Vec3 {
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
    #[pyo3(get, set)]
    pub z: f64,
}

#[pymethods]
impl Vec3 {
    #[new]
    fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn __repr__(&self) -> String {
        format!("Vec3({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }

    fn magnitude(&self) -> f64 {
        CoreVec3::from(*self).magnitude()
    }

    fn to_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

impl From<CoreVec3> for Vec3 {
    fn from(v: CoreVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3> for CoreVec3 {
    fn from(v: Vec3) -> Self {
        CoreVec3::new(v.x, v.y, v.z)
    }
}

type Triple = (f64, f64, f64);

/// `(session_id, position, velocity, radius, giant)`; radius <= 0 uses the
/// default, scaled up for giants.
type PlayerTuple = (String, Triple, Triple, f64, bool);

fn to_core(t: Triple) -> CoreVec3 {
    CoreVec3::new(t.0, t.1, t.2)
}

fn profile_err(err: ProfileError) -> PyErr {
    match err {
        ProfileError::IoError(_) => PyIOError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// Ball prediction engine.
///
/// All times are milliseconds on the caller's clock except `dt`, which is
/// seconds.
#[pyclass]
pub struct PredictionEngine {
    inner: CoreEngine,
}

#[pymethods]
impl PredictionEngine {
    /// Create an engine with default tuning, ball at rest at (x, y, z).
    #[new]
    #[pyo3(signature = (x=0.0, y=0.0, z=0.0))]
    fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            inner: CoreEngine::new(CoreVec3::new(x, y, z)),
        }
    }

    /// Create an engine from `<base_path>/<name>.yaml`.
    #[staticmethod]
    #[pyo3(signature = (base_path, name, x=0.0, y=0.0, z=0.0))]
    fn from_profile(base_path: &str, name: &str, x: f64, y: f64, z: f64) -> PyResult<Self> {
        let config = ProfileLoader::new(base_path).load(name).map_err(profile_err)?;
        Ok(Self {
            inner: CoreEngine::with_config(config, CoreVec3::new(x, y, z)),
        })
    }

    /// Advance one frame.
    #[pyo3(signature = (dt, now_ms, players=Vec::new(), local_player_id=None))]
    fn update(
        &mut self,
        dt: f64,
        now_ms: f64,
        players: Vec<PlayerTuple>,
        local_player_id: Option<String>,
    ) {
        let players: Vec<PlayerInfo> = players
            .into_iter()
            .map(|(id, pos, vel, radius, giant)| {
                PlayerInfo::new(id, to_core(pos), to_core(vel), radius).with_giant(giant)
            })
            .collect();
        self.inner
            .update(dt, now_ms, &players, local_player_id.as_deref());
    }

    /// Ingest a server update. Returns "hard" or "soft".
    #[pyo3(signature = (x, y, z, tick, now_ms, velocity=None))]
    fn on_server_update(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        tick: u64,
        now_ms: f64,
        velocity: Option<Triple>,
    ) -> &'static str {
        let update = ServerUpdate {
            x,
            y,
            z,
            vx: velocity.map(|v| v.0),
            vy: velocity.map(|v| v.1),
            vz: velocity.map(|v| v.2),
            tick,
        };
        match self.inner.on_server_update(update, now_ms) {
            ReconcileOutcome::Hard => "hard",
            ReconcileOutcome::Soft => "soft",
        }
    }

    fn update_latency(&mut self, ping_ms: f64, jitter_ms: f64) {
        self.inner.update_latency(ping_ms, jitter_ms);
    }

    /// Apply a local kick. `input_timestamp` enables lag compensation.
    #[pyo3(signature = (impulse, input_timestamp, now_ms))]
    fn apply_kick_prediction(&mut self, impulse: Vec3, input_timestamp: Option<f64>, now_ms: f64) {
        self.inner
            .apply_kick_prediction(impulse.into(), input_timestamp, now_ms);
    }

    #[pyo3(signature = (x=0.0, y=0.0, z=0.0))]
    fn reset(&mut self, x: f64, y: f64, z: f64) {
        self.inner.reset(CoreVec3::new(x, y, z));
    }

    fn visual_position(&self) -> Vec3 {
        self.inner.visual_position().into()
    }

    fn visual_velocity(&self) -> Vec3 {
        self.inner.visual_velocity().into()
    }

    fn predicted_position(&self) -> Vec3 {
        self.inner.predicted_state().position.into()
    }

    fn velocity(&self) -> Vec3 {
        self.inner.velocity().into()
    }

    #[getter]
    fn confidence(&self) -> f64 {
        self.inner.confidence()
    }

    #[getter]
    fn adaptive_lookahead(&self) -> f64 {
        self.inner.adaptive_lookahead()
    }

    fn is_in_first_touch(&self) -> bool {
        self.inner.is_in_first_touch()
    }

    /// "free", "first_touch" or "continuous".
    fn phase(&self) -> &'static str {
        match self.inner.phase() {
            ContactPhase::Free => "free",
            ContactPhase::FirstTouch { .. } => "first_touch",
            ContactPhase::ContinuousCollision => "continuous",
        }
    }

    /// Session id of the last predicted collision, if any.
    fn last_collision(&self) -> Option<String> {
        self.inner.last_collision().map(|c| c.player_id.clone())
    }

    /// Trajectory preview as a list of (x, y, z).
    fn trajectory(&self) -> Vec<Triple> {
        self.inner
            .trajectory()
            .points()
            .iter()
            .map(|p| (p.position.x, p.position.y, p.position.z))
            .collect()
    }

    /// Get current state as dict for easy inspection.
    fn state_dict(&self) -> PyResult<PyObject> {
        Python::with_gil(|py| {
            let state = self.inner.predicted_state();
            let dict = pyo3::types::PyDict::new(py);
            dict.set_item("tick", state.tick)?;
            dict.set_item("ball_x", state.position.x)?;
            dict.set_item("ball_y", state.position.y)?;
            dict.set_item("ball_z", state.position.z)?;
            dict.set_item("ball_vx", state.velocity.x)?;
            dict.set_item("ball_vy", state.velocity.y)?;
            dict.set_item("ball_vz", state.velocity.z)?;
            dict.set_item("confidence", self.inner.confidence())?;
            dict.set_item("ping", self.inner.ping_metrics().ping)?;
            dict.set_item("rollback_len", self.inner.rollback_len())?;
            dict.set_item("cooldown", self.inner.collision_cooldown())?;
            Ok(dict.into())
        })
    }
}

/// Python module definition.
#[pymodule]
fn touchline_predict(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vec3>()?;
    m.add_class::<PredictionEngine>()?;
    Ok(())
}
