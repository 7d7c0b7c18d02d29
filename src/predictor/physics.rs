//! Qualitative physics reasoning.
//!
//! Closed-form heuristics over a handful of object descriptors. These are
//! deliberately approximate; nothing here is a rigid-body solver. Every
//! answer carries a fixed confidence per query type and a short reasoning
//! trail.
//!
//! Axes: `position[1]` is height; x and z span the ground plane.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Downward acceleration used by the ballistic integrator.
pub const GRAVITY: f64 = -9.8;
pub const TRAJECTORY_DT: f64 = 0.1;
pub const TRAJECTORY_STEPS: usize = 10;
/// Vertical velocity retained (and inverted) on ground contact.
pub const BOUNCE_DAMPING: f64 = 0.5;
/// Direct-distance cutoff for reachability.
pub const REACH_DISTANCE: f64 = 100.0;
/// Horizontal slack within which one object can support another.
pub const SUPPORT_TOLERANCE: f64 = 1.0;
/// Containment radius for a container with no mass.
pub const DEFAULT_CONTAINER_RADIUS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicsQueryType {
    Collision,
    Stability,
    Containment,
    Reachability,
    Causation,
    Trajectory,
}

impl PhysicsQueryType {
    /// Fixed confidence reflecting how crude each heuristic is.
    pub fn confidence(self) -> f64 {
        match self {
            PhysicsQueryType::Collision => 0.8,
            PhysicsQueryType::Stability => 0.6,
            PhysicsQueryType::Containment => 0.7,
            PhysicsQueryType::Reachability => 0.5,
            PhysicsQueryType::Causation => 0.6,
            PhysicsQueryType::Trajectory => 0.7,
        }
    }

    fn min_objects(self) -> usize {
        match self {
            PhysicsQueryType::Stability | PhysicsQueryType::Trajectory => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsObject {
    pub id: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub velocity: Option<[f64; 3]>,
    #[serde(default)]
    pub mass: Option<f64>,
}

impl PhysicsObject {
    pub fn new(id: impl Into<String>, position: [f64; 3]) -> Self {
        Self { id: id.into(), position, velocity: None, mass: None }
    }

    pub fn with_velocity(mut self, velocity: [f64; 3]) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Radius approximated as `cbrt(mass)`, 1 for mass-less objects.
    pub fn radius(&self) -> f64 {
        self.mass.map(f64::cbrt).unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsQuery {
    pub query_type: PhysicsQueryType,
    pub objects: Vec<PhysicsObject>,
}

impl PhysicsQuery {
    pub fn new(query_type: PhysicsQueryType, objects: Vec<PhysicsObject>) -> Self {
        Self { query_type, objects }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Bool { value: bool },
    Trajectory { waypoints: Vec<[f64; 3]>, summary: String },
}

impl Verdict {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Verdict::Bool { value } => Some(*value),
            Verdict::Trajectory { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsAnswer {
    pub query_type: PhysicsQueryType,
    pub verdict: Verdict,
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

/// Dispatch a query to its heuristic.
pub fn reason(query: &PhysicsQuery) -> Result<PhysicsAnswer> {
    let needed = query.query_type.min_objects();
    if query.objects.len() < needed {
        return Err(Error::InvalidInput(format!(
            "{:?} query needs at least {needed} object(s), got {}",
            query.query_type,
            query.objects.len()
        )));
    }

    let objs = &query.objects;
    let (verdict, reasoning) = match query.query_type {
        PhysicsQueryType::Collision => collision(&objs[0], &objs[1]),
        PhysicsQueryType::Stability => stability(objs),
        PhysicsQueryType::Containment => containment(&objs[0], &objs[1]),
        PhysicsQueryType::Reachability => reachability(&objs[0], &objs[1]),
        PhysicsQueryType::Causation => causation(&objs[0], &objs[1]),
        PhysicsQueryType::Trajectory => trajectory(&objs[0]),
    };

    Ok(PhysicsAnswer {
        query_type: query.query_type,
        verdict,
        confidence: query.query_type.confidence(),
        reasoning,
    })
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

fn yes_no(value: bool) -> Verdict {
    Verdict::Bool { value }
}

fn collision(a: &PhysicsObject, b: &PhysicsObject) -> (Verdict, Vec<String>) {
    let d = distance(&a.position, &b.position);
    let reach = a.radius() + b.radius();
    let hit = d < reach;
    (
        yes_no(hit),
        vec![
            format!("distance between {} and {} is {d:.3}", a.id, b.id),
            format!("radius sum (cbrt of mass) is {reach:.3}"),
            if hit { "objects overlap".into() } else { "objects are apart".into() },
        ],
    )
}

fn stability(objects: &[PhysicsObject]) -> (Verdict, Vec<String>) {
    let mut reasoning = Vec::new();
    let mut stable = true;

    for obj in objects.iter().filter(|o| o.position[1] > 0.0) {
        let supported = objects.iter().any(|other| {
            other.id != obj.id
                && other.position[1] < obj.position[1]
                && (other.position[0] - obj.position[0]).hypot(other.position[2] - obj.position[2])
                    < SUPPORT_TOLERANCE
        });
        if supported {
            reasoning.push(format!("{} rests on a lower object", obj.id));
        } else {
            reasoning.push(format!("{} is elevated with nothing underneath", obj.id));
            stable = false;
        }
    }

    if reasoning.is_empty() {
        reasoning.push("all objects are on the ground".into());
    }
    (yes_no(stable), reasoning)
}

fn containment(inner: &PhysicsObject, outer: &PhysicsObject) -> (Verdict, Vec<String>) {
    let radius = outer
        .mass
        .map(|m| 2.0 * m.cbrt())
        .unwrap_or(DEFAULT_CONTAINER_RADIUS);
    let d = distance(&inner.position, &outer.position);
    let inside = d < radius;
    (
        yes_no(inside),
        vec![
            format!("{} has containment radius {radius:.3}", outer.id),
            format!("{} center is {d:.3} from {} center", inner.id, outer.id),
        ],
    )
}

fn reachability(a: &PhysicsObject, b: &PhysicsObject) -> (Verdict, Vec<String>) {
    let d = distance(&a.position, &b.position);
    let reachable = d < REACH_DISTANCE;
    (
        yes_no(reachable),
        vec![format!(
            "direct distance {d:.3} {} reach limit {REACH_DISTANCE}",
            if reachable { "within" } else { "exceeds" }
        )],
    )
}

fn causation(cause: &PhysicsObject, effect: &PhysicsObject) -> (Verdict, Vec<String>) {
    let Some(v) = cause.velocity else {
        return (yes_no(false), vec![format!("{} is not moving", cause.id)]);
    };
    let toward: Vec<f64> = effect
        .position
        .iter()
        .zip(&cause.position)
        .map(|(e, c)| e - c)
        .collect();
    let dot: f64 = v.iter().zip(&toward).map(|(a, b)| a * b).sum();
    let approaching = dot > 0.0;
    (
        yes_no(approaching),
        vec![
            format!("velocity · direction to {} = {dot:.3}", effect.id),
            if approaching {
                format!("{} is moving toward {}", cause.id, effect.id)
            } else {
                format!("{} is not moving toward {}", cause.id, effect.id)
            },
        ],
    )
}

fn trajectory(obj: &PhysicsObject) -> (Verdict, Vec<String>) {
    let mut p = obj.position;
    let mut v = obj.velocity.unwrap_or([0.0; 3]);
    let mut waypoints = Vec::with_capacity(TRAJECTORY_STEPS);
    let mut bounces = 0;

    for _ in 0..TRAJECTORY_STEPS {
        v[1] += GRAVITY * TRAJECTORY_DT;
        for axis in 0..3 {
            p[axis] += v[axis] * TRAJECTORY_DT;
        }
        if p[1] < 0.0 {
            p[1] = 0.0;
            v[1] = -v[1] * BOUNCE_DAMPING;
            bounces += 1;
        }
        waypoints.push(p);
    }

    let summary = waypoints
        .iter()
        .map(|w| format!("({:.2}, {:.2}, {:.2})", w[0], w[1], w[2]))
        .collect::<Vec<_>>()
        .join(" -> ");

    (
        Verdict::Trajectory { waypoints, summary },
        vec![
            format!("forward Euler, {TRAJECTORY_STEPS} steps of {TRAJECTORY_DT}s, g = {GRAVITY}"),
            format!("{bounces} ground contact(s)"),
        ],
    )
}
