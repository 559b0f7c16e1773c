//! Perception and sensing system
//!
//! Perceivables are things in the world that can be seen or heard; perceivers
//! are the sensors attached to agents. Each evaluation pass rebuilds a
//! perceiver's list of [`PerceivedObject`]s, checking the visual cone first,
//! then hearing, then plain proximity. A pair yields at most one contact.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::{PerceiverDefaults, PerceptionTuning};
use crate::error::{PerceptionError, PerceptionResult};
use crate::handle::{Handle, HandleMap};

/// Sense through which a contact was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    /// Inside the view cone with a clear line of sight
    Visual,
    /// Heard within hearing distance
    Auditory,
    /// Close enough to be felt
    Proximity,
}

/// One contact produced by an evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceivedObject {
    /// Entity that was perceived
    pub entity_id: u64,
    /// Position at the time of perception
    pub position: Vec3,
    /// Last position this perceiver knew of, retained after the target is lost
    pub last_known_position: Vec3,
    pub modality: Modality,
    /// Contact strength in [0, 1]
    pub strength: f32,
    pub distance: f32,
    /// Game time of the evaluation (ms)
    pub timestamp_ms: f64,
    /// Visual and proximity contacts are treated as hostile
    pub hostile: bool,
}

/// Something that can be seen or heard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perceivable {
    pub entity_id: u64,
    pub position: Vec3,
    /// Extends the visual range check by the target's size
    pub visual_radius: f32,
    /// Sound emission, 0 for silent
    pub auditory_strength: f32,
    pub visible: bool,
    /// Inactive perceivables are skipped entirely
    pub active: bool,
}

impl Perceivable {
    /// Visible, silent perceivable with a half-unit radius
    pub fn new(entity_id: u64, position: Vec3) -> Self {
        Self {
            entity_id,
            position,
            visual_radius: 0.5,
            auditory_strength: 0.0,
            visible: true,
            active: true,
        }
    }

    pub fn with_visual_radius(mut self, radius: f32) -> Self {
        self.visual_radius = radius;
        self
    }

    pub fn with_auditory_strength(mut self, strength: f32) -> Self {
        self.auditory_strength = strength;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    fn validate(&self) -> PerceptionResult<()> {
        if !self.position.is_finite() {
            return Err(PerceptionError::InvalidArgument(format!(
                "perceivable {} has a non-finite position",
                self.entity_id
            )));
        }
        if !(self.visual_radius >= 0.0) || !(self.auditory_strength >= 0.0) {
            return Err(PerceptionError::InvalidArgument(format!(
                "perceivable {} has negative radius or emission",
                self.entity_id
            )));
        }
        Ok(())
    }
}

/// Memory of a contact, kept after the contact is lost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionMemory {
    pub entity_id: u64,
    pub last_known_position: Vec3,
    /// Game time the contact was last perceived (ms)
    pub last_perceived_ms: f64,
    pub modality: Modality,
    pub hostile: bool,
    /// Number of passes that perceived this entity
    pub perception_count: u32,
}

impl PerceptionMemory {
    fn from_contact(contact: &PerceivedObject) -> Self {
        Self {
            entity_id: contact.entity_id,
            last_known_position: contact.position,
            last_perceived_ms: contact.timestamp_ms,
            modality: contact.modality,
            hostile: contact.hostile,
            perception_count: 1,
        }
    }

    fn refresh(&mut self, contact: &PerceivedObject) {
        self.last_known_position = contact.position;
        self.last_perceived_ms = contact.timestamp_ms;
        self.modality = contact.modality;
        self.hostile = contact.hostile;
        self.perception_count += 1;
    }

    /// Time since this entity was last perceived
    pub fn age_ms(&self, game_time_ms: f64) -> f64 {
        game_time_ms - self.last_perceived_ms
    }
}

/// Sensor attached to an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perceiver {
    pub entity_id: u64,
    pub position: Vec3,
    /// Unit facing direction
    pub forward: Vec3,
    /// Full cone angle (radians)
    pub fov: f32,
    pub view_distance: f32,
    pub hearing_distance: f32,
    /// Minimum time between evaluation passes (ms)
    pub period_ms: f64,
    last_evaluated_ms: Option<f64>,
    perceived: Vec<PerceivedObject>,
    memory: HashMap<u64, PerceptionMemory>,
}

impl Perceiver {
    /// Perceiver with the stock sensor values
    pub fn new(entity_id: u64, position: Vec3, forward: Vec3) -> Self {
        Self::from_defaults(entity_id, position, forward, &PerceiverDefaults::default())
    }

    /// Perceiver using the given sensor template
    pub fn from_defaults(
        entity_id: u64,
        position: Vec3,
        forward: Vec3,
        defaults: &PerceiverDefaults,
    ) -> Self {
        Self {
            entity_id,
            position,
            forward,
            fov: defaults.fov,
            view_distance: defaults.view_distance,
            hearing_distance: defaults.hearing_distance,
            period_ms: defaults.period_ms,
            last_evaluated_ms: None,
            perceived: Vec::new(),
            memory: HashMap::new(),
        }
    }

    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = fov;
        self
    }

    pub fn with_view_distance(mut self, distance: f32) -> Self {
        self.view_distance = distance;
        self
    }

    pub fn with_hearing_distance(mut self, distance: f32) -> Self {
        self.hearing_distance = distance;
        self
    }

    pub fn with_period_ms(mut self, period_ms: f64) -> Self {
        self.period_ms = period_ms;
        self
    }

    /// Contacts from the latest evaluation pass
    pub fn perceived_objects(&self) -> &[PerceivedObject] {
        &self.perceived
    }

    /// Game time of the latest evaluation pass
    pub fn last_evaluated_ms(&self) -> Option<f64> {
        self.last_evaluated_ms
    }

    /// Remembered contacts, current and lost
    pub fn memory(&self) -> impl Iterator<Item = &PerceptionMemory> {
        self.memory.values()
    }

    /// Last-known position of an entity, if it is still remembered
    pub fn last_known_position(&self, entity_id: u64) -> Option<Vec3> {
        self.memory.get(&entity_id).map(|m| m.last_known_position)
    }

    /// Whether the latest pass perceived `entity_id`
    pub fn is_perceiving(&self, entity_id: u64) -> bool {
        self.perceived.iter().any(|p| p.entity_id == entity_id)
    }

    /// Most recently perceived entity that the latest pass no longer sees
    pub fn most_recent_lost_contact(&self) -> Option<&PerceptionMemory> {
        self.memory
            .values()
            .filter(|m| !self.is_perceiving(m.entity_id))
            .max_by(|a, b| {
                a.last_perceived_ms
                    .partial_cmp(&b.last_perceived_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.entity_id.cmp(&a.entity_id))
            })
    }

    fn is_due(&self, game_time_ms: f64) -> bool {
        match self.last_evaluated_ms {
            None => true,
            Some(last) => game_time_ms - last >= self.period_ms,
        }
    }

    fn validate(&mut self) -> PerceptionResult<()> {
        if !self.position.is_finite() || !self.forward.is_finite() {
            return Err(PerceptionError::InvalidArgument(format!(
                "perceiver {} has a non-finite pose",
                self.entity_id
            )));
        }
        self.forward = self.forward.try_normalize().ok_or_else(|| {
            PerceptionError::InvalidArgument(format!(
                "perceiver {} has a zero forward vector",
                self.entity_id
            ))
        })?;
        if !(self.fov > 0.0 && self.fov <= std::f32::consts::TAU) {
            return Err(PerceptionError::InvalidArgument(format!(
                "perceiver {} fov {} outside (0, 2pi]",
                self.entity_id, self.fov
            )));
        }
        if !(self.view_distance >= 0.0) || !(self.hearing_distance >= 0.0) || !(self.period_ms >= 0.0)
        {
            return Err(PerceptionError::InvalidArgument(format!(
                "perceiver {} has negative ranges or period",
                self.entity_id
            )));
        }
        Ok(())
    }
}

/// Line-of-sight query supplied by the collision layer
pub trait LineOfSight: Send + Sync {
    /// Whether anything other than `exclude_entity` blocks the segment
    fn is_obstructed(&self, from: Vec3, to: Vec3, exclude_entity: u64) -> bool;
}

/// Line of sight used when no collision backend is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObstruction;

impl LineOfSight for NoObstruction {
    fn is_obstructed(&self, _from: Vec3, _to: Vec3, _exclude_entity: u64) -> bool {
        false
    }
}

impl<F> LineOfSight for F
where
    F: Fn(Vec3, Vec3, u64) -> bool + Send + Sync,
{
    fn is_obstructed(&self, from: Vec3, to: Vec3, exclude_entity: u64) -> bool {
        self(from, to, exclude_entity)
    }
}

/// Registry of perceivers and perceivables
pub struct PerceptionSystem {
    perceivers: HandleMap<Perceiver>,
    perceivables: HandleMap<Perceivable>,
    line_of_sight: Box<dyn LineOfSight>,
    tuning: PerceptionTuning,
    game_time_ms: f64,
}

impl PerceptionSystem {
    pub fn new() -> Self {
        Self::with_tuning(PerceptionTuning::default())
    }

    pub fn with_tuning(tuning: PerceptionTuning) -> Self {
        Self {
            perceivers: HandleMap::new(),
            perceivables: HandleMap::new(),
            line_of_sight: Box::new(NoObstruction),
            tuning,
            game_time_ms: 0.0,
        }
    }

    /// Replace the line-of-sight query
    pub fn with_line_of_sight(mut self, line_of_sight: impl LineOfSight + 'static) -> Self {
        self.set_line_of_sight(line_of_sight);
        self
    }

    pub fn set_line_of_sight(&mut self, line_of_sight: impl LineOfSight + 'static) {
        self.line_of_sight = Box::new(line_of_sight);
    }

    pub fn tuning(&self) -> &PerceptionTuning {
        &self.tuning
    }

    pub fn set_tuning(&mut self, tuning: PerceptionTuning) {
        self.tuning = tuning;
    }

    /// Game time recorded by the latest update
    pub fn game_time_ms(&self) -> f64 {
        self.game_time_ms
    }

    /// Register a perceiver. The forward vector is normalized.
    pub fn add_perceiver(&mut self, mut perceiver: Perceiver) -> PerceptionResult<Handle<Perceiver>> {
        perceiver.validate()?;
        let entity_id = perceiver.entity_id;
        let handle = self.perceivers.insert(perceiver);
        log::info!("Registered perceiver for entity {} as {:?}", entity_id, handle);
        Ok(handle)
    }

    pub fn add_perceivable(&mut self, perceivable: Perceivable) -> PerceptionResult<Handle<Perceivable>> {
        perceivable.validate()?;
        let entity_id = perceivable.entity_id;
        let handle = self.perceivables.insert(perceivable);
        log::info!("Registered perceivable for entity {} as {:?}", entity_id, handle);
        Ok(handle)
    }

    pub fn remove_perceiver(&mut self, handle: Handle<Perceiver>) -> PerceptionResult<Perceiver> {
        let perceiver = self.perceivers.remove(handle).ok_or_else(|| {
            log::warn!("Cannot remove unknown perceiver {:?}", handle);
            PerceptionError::PerceiverNotFound(handle)
        })?;
        log::info!("Removed perceiver for entity {}", perceiver.entity_id);
        Ok(perceiver)
    }

    pub fn remove_perceivable(&mut self, handle: Handle<Perceivable>) -> PerceptionResult<Perceivable> {
        let perceivable = self.perceivables.remove(handle).ok_or_else(|| {
            log::warn!("Cannot remove unknown perceivable {:?}", handle);
            PerceptionError::PerceivableNotFound(handle)
        })?;
        log::info!("Removed perceivable for entity {}", perceivable.entity_id);
        Ok(perceivable)
    }

    pub fn perceiver(&self, handle: Handle<Perceiver>) -> Option<&Perceiver> {
        self.perceivers.get(handle)
    }

    pub fn perceiver_mut(&mut self, handle: Handle<Perceiver>) -> Option<&mut Perceiver> {
        self.perceivers.get_mut(handle)
    }

    pub fn perceivable(&self, handle: Handle<Perceivable>) -> Option<&Perceivable> {
        self.perceivables.get(handle)
    }

    pub fn perceivable_mut(&mut self, handle: Handle<Perceivable>) -> Option<&mut Perceivable> {
        self.perceivables.get_mut(handle)
    }

    pub fn perceiver_count(&self) -> usize {
        self.perceivers.len()
    }

    pub fn perceivable_count(&self) -> usize {
        self.perceivables.len()
    }

    /// Read-only view of a perceiver's latest contacts
    pub fn perceived_objects(&self, handle: Handle<Perceiver>) -> PerceptionResult<&[PerceivedObject]> {
        self.perceivers
            .get(handle)
            .map(Perceiver::perceived_objects)
            .ok_or(PerceptionError::PerceiverNotFound(handle))
    }

    /// Move a perceiver. A zero `forward` keeps the previous facing.
    pub fn set_perceiver_pose(
        &mut self,
        handle: Handle<Perceiver>,
        position: Vec3,
        forward: Vec3,
    ) -> PerceptionResult<()> {
        if !position.is_finite() || !forward.is_finite() {
            return Err(PerceptionError::InvalidArgument(
                "non-finite perceiver pose".to_string(),
            ));
        }
        let perceiver = self
            .perceivers
            .get_mut(handle)
            .ok_or(PerceptionError::PerceiverNotFound(handle))?;
        perceiver.position = position;
        if let Some(forward) = forward.try_normalize() {
            perceiver.forward = forward;
        }
        Ok(())
    }

    pub fn set_perceivable_position(
        &mut self,
        handle: Handle<Perceivable>,
        position: Vec3,
    ) -> PerceptionResult<()> {
        if !position.is_finite() {
            return Err(PerceptionError::InvalidArgument(
                "non-finite perceivable position".to_string(),
            ));
        }
        let perceivable = self
            .perceivables
            .get_mut(handle)
            .ok_or(PerceptionError::PerceivableNotFound(handle))?;
        perceivable.position = position;
        Ok(())
    }

    /// Run the evaluation pass for every perceiver whose period has elapsed.
    ///
    /// Perceivers that are not due keep their previous contact list.
    pub fn update(&mut self, delta_ms: f32, game_time_ms: f64) {
        self.game_time_ms = game_time_ms;

        let mut evaluated = 0usize;
        for (_, perceiver) in self.perceivers.iter_mut() {
            if !perceiver.is_due(game_time_ms) {
                continue;
            }
            evaluate(
                perceiver,
                &self.perceivables,
                self.line_of_sight.as_ref(),
                &self.tuning,
                game_time_ms,
            );
            evaluated += 1;
        }

        log::trace!(
            "Perception update dt={}ms t={}ms: evaluated {} of {} perceivers",
            delta_ms,
            game_time_ms,
            evaluated,
            self.perceivers.len()
        );
    }
}

impl Default for PerceptionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PerceptionSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptionSystem")
            .field("perceivers", &self.perceivers.len())
            .field("perceivables", &self.perceivables.len())
            .field("tuning", &self.tuning)
            .field("game_time_ms", &self.game_time_ms)
            .finish()
    }
}

fn evaluate(
    perceiver: &mut Perceiver,
    perceivables: &HandleMap<Perceivable>,
    line_of_sight: &dyn LineOfSight,
    tuning: &PerceptionTuning,
    game_time_ms: f64,
) {
    perceiver.perceived.clear();

    for (_, target) in perceivables.iter() {
        if !target.active || target.entity_id == perceiver.entity_id {
            continue;
        }
        if let Some(contact) = sense(perceiver, target, line_of_sight, tuning, game_time_ms) {
            perceiver.perceived.push(contact);
        }
    }

    for contact in &perceiver.perceived {
        perceiver
            .memory
            .entry(contact.entity_id)
            .and_modify(|m| m.refresh(contact))
            .or_insert_with(|| PerceptionMemory::from_contact(contact));
    }
    let memory_duration = tuning.memory_duration_ms;
    perceiver
        .memory
        .retain(|_, m| m.age_ms(game_time_ms) <= memory_duration);

    perceiver.last_evaluated_ms = Some(game_time_ms);
}

fn sense(
    perceiver: &Perceiver,
    target: &Perceivable,
    line_of_sight: &dyn LineOfSight,
    tuning: &PerceptionTuning,
    game_time_ms: f64,
) -> Option<PerceivedObject> {
    let distance = perceiver.position.distance(target.position);
    let contact = |modality, strength: f32, hostile| PerceivedObject {
        entity_id: target.entity_id,
        position: target.position,
        last_known_position: target.position,
        modality,
        strength,
        distance,
        timestamp_ms: game_time_ms,
        hostile,
    };

    if target.visible && distance <= perceiver.view_distance + target.visual_radius {
        let angle = angle_between(perceiver.forward, target.position - perceiver.position);
        if angle <= perceiver.fov * 0.5
            && !line_of_sight.is_obstructed(perceiver.position, target.position, perceiver.entity_id)
        {
            let strength = if perceiver.view_distance > 0.0 {
                (1.0 - distance / perceiver.view_distance).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return Some(contact(Modality::Visual, strength, true));
        }
    }

    if perceiver.hearing_distance > 0.0
        && distance <= perceiver.hearing_distance
        && target.auditory_strength > 0.0
    {
        let strength = target.auditory_strength * (1.0 - distance / perceiver.hearing_distance);
        if strength > tuning.auditory_threshold {
            return Some(contact(Modality::Auditory, strength.min(1.0), false));
        }
    }

    if distance <= tuning.proximity_radius {
        return Some(contact(Modality::Proximity, 1.0, true));
    }

    None
}

/// Angle between two vectors (radians); zero when either is zero-length
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    let mag = a.length() * b.length();
    if mag == 0.0 {
        return 0.0;
    }
    (a.dot(b) / mag).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn system_with_observer() -> (PerceptionSystem, Handle<Perceiver>) {
        let mut system = PerceptionSystem::new();
        let perceiver = Perceiver::new(1, Vec3::ZERO, Vec3::Z)
            .with_fov(FRAC_PI_2)
            .with_view_distance(10.0)
            .with_hearing_distance(15.0);
        let handle = system.add_perceiver(perceiver).unwrap();
        (system, handle)
    }

    #[test]
    fn test_visual_contact() {
        let (mut system, observer) = system_with_observer();
        system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 5.0)))
            .unwrap();

        system.update(16.0, 0.0);
        let seen = system.perceived_objects(observer).unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].entity_id, 2);
        assert_eq!(seen[0].modality, Modality::Visual);
        assert!((seen[0].strength - 0.5).abs() < 1e-5);
        assert!(seen[0].hostile);
    }

    #[test]
    fn test_never_perceives_itself() {
        let (mut system, observer) = system_with_observer();
        system
            .add_perceivable(Perceivable::new(1, Vec3::new(0.0, 0.0, 1.0)))
            .unwrap();

        system.update(16.0, 0.0);
        assert!(system.perceived_objects(observer).unwrap().is_empty());
    }

    #[test]
    fn test_behind_is_heard_not_seen() {
        let (mut system, observer) = system_with_observer();
        system
            .add_perceivable(
                Perceivable::new(2, Vec3::new(0.0, 0.0, -6.0)).with_auditory_strength(1.0),
            )
            .unwrap();

        system.update(16.0, 0.0);
        let heard = system.perceived_objects(observer).unwrap();

        assert_eq!(heard.len(), 1);
        assert_eq!(heard[0].modality, Modality::Auditory);
        assert!((heard[0].strength - 0.6).abs() < 1e-5);
        assert!(!heard[0].hostile);
    }

    #[test]
    fn test_faint_sound_ignored() {
        let (mut system, observer) = system_with_observer();
        // 1.0 * (1 - 14/15) is below the threshold
        system
            .add_perceivable(
                Perceivable::new(2, Vec3::new(0.0, 0.0, -14.0)).with_auditory_strength(1.0),
            )
            .unwrap();

        system.update(16.0, 0.0);
        assert!(system.perceived_objects(observer).unwrap().is_empty());
    }

    #[test]
    fn test_proximity_behind() {
        let (mut system, observer) = system_with_observer();
        system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, -1.0)))
            .unwrap();

        system.update(16.0, 0.0);
        let felt = system.perceived_objects(observer).unwrap();

        assert_eq!(felt.len(), 1);
        assert_eq!(felt[0].modality, Modality::Proximity);
        assert_eq!(felt[0].strength, 1.0);
    }

    #[test]
    fn test_sound_takes_priority_over_proximity() {
        let (mut system, observer) = system_with_observer();
        // Inside the proximity radius, outside the view cone, and audible
        system
            .add_perceivable(
                Perceivable::new(2, Vec3::new(0.0, 0.0, -1.0)).with_auditory_strength(1.0),
            )
            .unwrap();

        system.update(16.0, 0.0);
        let heard = system.perceived_objects(observer).unwrap();

        assert_eq!(heard.len(), 1);
        assert_eq!(heard[0].modality, Modality::Auditory);
        assert!(!heard[0].hostile);
        assert!((heard[0].strength - (1.0 - 1.0 / 15.0)).abs() < 1e-5);
    }

    #[test]
    fn test_view_distance_includes_visual_radius() {
        let (mut system, observer) = system_with_observer();
        // View distance 10 plus the default 0.5 radius
        system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 10.4)))
            .unwrap();
        system
            .add_perceivable(Perceivable::new(3, Vec3::new(0.0, 0.0, 10.6)))
            .unwrap();

        system.update(16.0, 0.0);
        let seen = system.perceived_objects(observer).unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].entity_id, 2);
        assert_eq!(seen[0].modality, Modality::Visual);
        assert_eq!(seen[0].strength, 0.0);
        assert!(seen[0].hostile);
    }

    #[test]
    fn test_visual_takes_priority() {
        let (mut system, observer) = system_with_observer();
        system
            .add_perceivable(
                Perceivable::new(2, Vec3::new(0.0, 0.0, 1.0)).with_auditory_strength(1.0),
            )
            .unwrap();

        system.update(16.0, 0.0);
        let seen = system.perceived_objects(observer).unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].modality, Modality::Visual);
    }

    #[test]
    fn test_obstructed_line_of_sight() {
        let (mut system, observer) = system_with_observer();
        system.set_line_of_sight(|_from: Vec3, _to: Vec3, exclude: u64| exclude == 1);
        system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 5.0)))
            .unwrap();

        system.update(16.0, 0.0);
        assert!(system.perceived_objects(observer).unwrap().is_empty());
    }

    #[test]
    fn test_inactive_and_invisible() {
        let (mut system, observer) = system_with_observer();
        system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 5.0)).with_active(false))
            .unwrap();
        system
            .add_perceivable(Perceivable::new(3, Vec3::new(1.0, 0.0, 5.0)).with_visible(false))
            .unwrap();

        system.update(16.0, 0.0);
        assert!(system.perceived_objects(observer).unwrap().is_empty());
    }

    #[test]
    fn test_evaluation_period() {
        let (mut system, observer) = system_with_observer();
        let target = system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 5.0)))
            .unwrap();

        system.update(16.0, 0.0);
        assert_eq!(system.perceived_objects(observer).unwrap().len(), 1);

        // Moved out of range, but the period has not elapsed
        system
            .set_perceivable_position(target, Vec3::new(0.0, 0.0, 50.0))
            .unwrap();
        system.update(16.0, 100.0);
        assert_eq!(system.perceived_objects(observer).unwrap().len(), 1);

        system.update(16.0, 200.0);
        assert!(system.perceived_objects(observer).unwrap().is_empty());
    }

    #[test]
    fn test_memory_retains_lost_contact() {
        let (mut system, observer) = system_with_observer();
        let target = system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 5.0)))
            .unwrap();
        system.update(16.0, 0.0);

        system
            .set_perceivable_position(target, Vec3::new(0.0, 0.0, 50.0))
            .unwrap();
        system.update(16.0, 1000.0);

        let perceiver = system.perceiver(observer).unwrap();
        assert!(!perceiver.is_perceiving(2));
        assert_eq!(perceiver.last_known_position(2), Some(Vec3::new(0.0, 0.0, 5.0)));
        assert_eq!(
            perceiver.most_recent_lost_contact().map(|m| m.entity_id),
            Some(2)
        );

        system.update(16.0, 20_000.0);
        assert_eq!(system.perceiver(observer).unwrap().last_known_position(2), None);
    }

    #[test]
    fn test_remove_and_stale_handles() {
        let (mut system, observer) = system_with_observer();
        let target = system
            .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 5.0)))
            .unwrap();

        system.remove_perceivable(target).unwrap();
        system.update(16.0, 0.0);
        assert!(system.perceived_objects(observer).unwrap().is_empty());

        system.remove_perceiver(observer).unwrap();
        assert_eq!(
            system.perceived_objects(observer),
            Err(PerceptionError::PerceiverNotFound(observer))
        );
        assert!(system.remove_perceivable(target).is_err());
        assert_eq!(system.perceiver_count(), 0);
    }

    #[test]
    fn test_invalid_templates_rejected() {
        let mut system = PerceptionSystem::new();
        assert!(system
            .add_perceiver(Perceiver::new(1, Vec3::ZERO, Vec3::ZERO))
            .is_err());
        assert!(system
            .add_perceiver(Perceiver::new(1, Vec3::ZERO, Vec3::Z).with_fov(0.0))
            .is_err());
        assert!(system
            .add_perceivable(Perceivable::new(2, Vec3::new(f32::NAN, 0.0, 0.0)))
            .is_err());

        let handle = system
            .add_perceiver(Perceiver::new(1, Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0)))
            .unwrap();
        assert_eq!(system.perceiver(handle).unwrap().forward, Vec3::Z);
    }

    #[test]
    fn test_angle_between() {
        assert!((angle_between(Vec3::X, Vec3::Z) - FRAC_PI_2).abs() < 1e-5);
        assert_eq!(angle_between(Vec3::ZERO, Vec3::Z), 0.0);
    }
}
