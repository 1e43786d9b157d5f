use std::collections::HashMap;

use glam::{Quat, Vec4};

use crate::model::avatar::{Node, Transform};

/// Node property driven by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimatedProperty {
    Translation,
    Rotation,
    Scale,
}

impl AnimatedProperty {
    /// Floats per keyframe value
    pub fn components(self) -> usize {
        match self {
            AnimatedProperty::Translation | AnimatedProperty::Scale => 3,
            AnimatedProperty::Rotation => 4,
        }
    }

    fn read(self, transform: &Transform) -> Vec4 {
        match self {
            AnimatedProperty::Translation => transform.translation.extend(0.0),
            AnimatedProperty::Scale => transform.scale.extend(0.0),
            AnimatedProperty::Rotation => Vec4::from(transform.rotation),
        }
    }

    fn write(self, node: &mut Node, v: Vec4) {
        match self {
            AnimatedProperty::Translation => node.pose.translation = v.truncate(),
            AnimatedProperty::Scale => node.pose.scale = v.truncate(),
            AnimatedProperty::Rotation => {
                let q = Quat::from_vec4(v);
                node.pose.rotation = if q.length_squared() > 0.0 { q.normalize() } else { Quat::IDENTITY };
            }
        }
    }

    /// Move `from` toward `to` by `s`; quaternions take the short arc
    fn mix(self, from: Vec4, to: Vec4, s: f32) -> Vec4 {
        match self {
            AnimatedProperty::Rotation => {
                let a = Quat::from_vec4(from).normalize();
                Vec4::from(a.slerp(Quat::from_vec4(to).normalize(), s))
            }
            _ => from.lerp(to, s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    /// Each keyframe stores in-tangent, value, out-tangent
    CubicSpline,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub node: usize,
    pub property: AnimatedProperty,
    pub interpolation: Interpolation,
    pub keyframe_ts: Vec<f32>,
    pub data: Vec<f32>,
}

impl Channel {
    pub fn duration(&self) -> f32 {
        self.keyframe_ts.last().copied().unwrap_or(0.0)
    }

    /// Keyframe before and after `t`; the same index twice outside the span
    fn window(&self, t: f32) -> (usize, usize) {
        let ts = &self.keyframe_ts;
        if ts.is_empty() || t <= ts[0] {
            return (0, 0);
        }
        match ts.iter().position(|&kf| t < kf) {
            Some(next) => (next - 1, next),
            None => (ts.len() - 1, ts.len() - 1),
        }
    }

    /// Value `k` of keyframe `i` (k = 0 in-tangent, 1 value, 2 out-tangent for cubic splines)
    fn element(&self, i: usize, k: usize) -> Vec4 {
        let n = self.property.components();
        let stride = if self.interpolation == Interpolation::CubicSpline { 3 * n } else { n };
        let offset = if self.interpolation == Interpolation::CubicSpline { k * n } else { 0 };
        let start = i * stride + offset;
        let mut out = [0.0; 4];
        if let Some(slice) = self.data.get(start..start + n) {
            out[..n].copy_from_slice(slice);
        }
        Vec4::from_array(out)
    }

    /// Sample the channel as a raw 4-vector (xyz for vectors, xyzw for quaternions)
    pub fn sample(&self, t: f32) -> Vec4 {
        let (prev, next) = self.window(t);
        let value_k = if self.interpolation == Interpolation::CubicSpline { 1 } else { 0 };
        if prev == next || self.interpolation == Interpolation::Step {
            return self.element(prev, value_k);
        }

        let t0 = self.keyframe_ts[prev];
        let t1 = self.keyframe_ts[next];
        let dt = t1 - t0;
        let s = if dt > 0.0 { (t - t0) / dt } else { 0.0 };

        match self.interpolation {
            Interpolation::Step => self.element(prev, 0),
            Interpolation::Linear => {
                let a = self.element(prev, 0);
                let b = self.element(next, 0);
                if self.property == AnimatedProperty::Rotation {
                    Vec4::from(Quat::from_vec4(a).slerp(Quat::from_vec4(b), s))
                } else {
                    a.lerp(b, s)
                }
            }
            Interpolation::CubicSpline => {
                let p0 = self.element(prev, 1);
                let m0 = self.element(prev, 2) * dt;
                let p1 = self.element(next, 1);
                let m1 = self.element(next, 0) * dt;
                let s2 = s * s;
                let s3 = s2 * s;
                p0 * (2.0 * s3 - 3.0 * s2 + 1.0)
                    + m0 * (s3 - 2.0 * s2 + s)
                    + p1 * (-2.0 * s3 + 3.0 * s2)
                    + m1 * (s3 - s2)
            }
        }
    }

    /// Write the sampled value into the node's pose
    pub fn apply(&self, t: f32, nodes: &mut [Node]) {
        if let Some(node) = nodes.get_mut(self.node) {
            self.property.write(node, self.sample(t));
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: Option<String>,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: Option<String>, channels: Vec<Channel>) -> Self {
        Self {
            name,
            duration: channels
                .iter()
                .map(|c| c.duration())
                .max_by(f32::total_cmp)
                .unwrap_or(0.0),
            channels,
        }
    }

    pub fn apply(&self, t: f32, nodes: &mut [Node]) {
        for channel in &self.channels {
            channel.apply(t, nodes);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Repeat,
}

/// Playback state of one clip
#[derive(Debug, Clone)]
pub struct ClipAction {
    pub clip: usize,
    pub time: f32,
    pub loop_mode: LoopMode,
    pub playing: bool,
    /// Share of this action when several drive the same property
    pub weight: f32,
}

impl ClipAction {
    fn advance(&mut self, dt: f32, duration: f32) {
        if !self.playing {
            return;
        }
        self.time += dt;
        if duration <= 0.0 {
            self.time = 0.0;
            return;
        }
        match self.loop_mode {
            LoopMode::Repeat => self.time = self.time.rem_euclid(duration),
            LoopMode::Once => self.time = self.time.clamp(0.0, duration),
        }
    }
}

/// Plays clips against a node tree
#[derive(Debug, Clone, Default)]
pub struct AnimationMixer {
    pub actions: Vec<ClipAction>,
}

impl AnimationMixer {
    /// One repeating action per clip, all playing
    pub fn play_all(clips: &[AnimationClip], loop_mode: LoopMode) -> Self {
        Self {
            actions: (0..clips.len())
                .map(|clip| ClipAction { clip, time: 0.0, loop_mode, playing: true, weight: 1.0 })
                .collect(),
        }
    }

    /// Advance every action by `dt` seconds and pose the nodes.
    ///
    /// Actions driving the same node property are averaged by weight. When the
    /// weights add up to less than one, the rest pose fills the remainder.
    pub fn update(&mut self, dt: f32, clips: &[AnimationClip], nodes: &mut [Node]) {
        let mut blended: HashMap<(usize, AnimatedProperty), (Vec4, f32)> = HashMap::new();
        for action in self.actions.iter_mut() {
            let Some(clip) = clips.get(action.clip) else { continue };
            action.advance(dt, clip.duration);
            if action.weight <= 0.0 {
                continue;
            }
            for channel in &clip.channels {
                if channel.node >= nodes.len() {
                    continue;
                }
                let value = channel.sample(action.time);
                blended
                    .entry((channel.node, channel.property))
                    .and_modify(|(acc, total)| {
                        *total += action.weight;
                        *acc = channel.property.mix(*acc, value, action.weight / *total);
                    })
                    .or_insert((value, action.weight));
            }
        }

        for ((idx, property), (value, total)) in blended {
            let node = &mut nodes[idx];
            let value = if total < 1.0 {
                property.mix(property.read(&node.rest), value, total)
            } else {
                value
            };
            property.write(node, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::avatar::Transform;
    use glam::Vec3;

    fn linear_translation() -> Channel {
        Channel {
            node: 0,
            property: AnimatedProperty::Translation,
            interpolation: Interpolation::Linear,
            keyframe_ts: vec![0.0, 1.0, 2.0],
            data: vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 4.0, 0.0],
        }
    }

    fn nodes() -> Vec<Node> {
        vec![Node {
            name: None,
            parent: None,
            children: vec![],
            rest: Transform::IDENTITY,
            pose: Transform::IDENTITY,
            mesh: None,
            skin: None,
        }]
    }

    #[test]
    fn test_linear_hits_keyframes_and_midpoints() {
        let c = linear_translation();
        assert_eq!(c.sample(1.0).truncate(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(c.sample(0.5).truncate(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(c.sample(1.5).truncate(), Vec3::new(2.0, 2.0, 0.0));
        // clamped outside the span
        assert_eq!(c.sample(-1.0).truncate(), Vec3::ZERO);
        assert_eq!(c.sample(9.0).truncate(), Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn test_step_holds_previous() {
        let mut c = linear_translation();
        c.interpolation = Interpolation::Step;
        assert_eq!(c.sample(0.99).truncate(), Vec3::ZERO);
        assert_eq!(c.sample(1.2).truncate(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_cubic_spline_with_zero_tangents_hits_endpoints() {
        let c = Channel {
            node: 0,
            property: AnimatedProperty::Scale,
            interpolation: Interpolation::CubicSpline,
            keyframe_ts: vec![0.0, 1.0],
            data: vec![
                0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 3.0, 3.0, 3.0, 0.0, 0.0, 0.0,
            ],
        };
        assert_eq!(c.sample(0.0).truncate(), Vec3::ONE);
        assert_eq!(c.sample(1.0).truncate(), Vec3::splat(3.0));
        assert!((c.sample(0.5).x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_slerp_stays_normalized() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let c = Channel {
            node: 0,
            property: AnimatedProperty::Rotation,
            interpolation: Interpolation::Linear,
            keyframe_ts: vec![0.0, 1.0],
            data: [a.to_array(), b.to_array()].concat(),
        };
        let mut n = nodes();
        c.apply(0.5, &mut n);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(n[0].pose.rotation.angle_between(expected) < 1e-4);
    }

    #[test]
    fn test_mixer_repeats_forever() {
        let clips = vec![AnimationClip::new(Some("idle".into()), vec![linear_translation()])];
        assert_eq!(clips[0].duration, 2.0);

        let mut mixer = AnimationMixer::play_all(&clips, LoopMode::Repeat);
        let mut n = nodes();
        for _ in 0..5 {
            mixer.update(0.5, &clips, &mut n);
        }
        // 2.5s wraps to 0.5s
        assert!((mixer.actions[0].time - 0.5).abs() < 1e-6);
        assert!((n[0].pose.translation - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_mixer_once_clamps() {
        let clips = vec![AnimationClip::new(None, vec![linear_translation()])];
        let mut mixer = AnimationMixer::play_all(&clips, LoopMode::Once);
        let mut n = nodes();
        mixer.update(10.0, &clips, &mut n);
        assert_eq!(mixer.actions[0].time, 2.0);
        assert_eq!(n[0].pose.translation, Vec3::new(2.0, 4.0, 0.0));
    }

    fn constant(property: AnimatedProperty, value: &[f32]) -> Channel {
        Channel {
            node: 0,
            property,
            interpolation: Interpolation::Step,
            keyframe_ts: vec![0.0],
            data: value.to_vec(),
        }
    }

    #[test]
    fn test_mixer_averages_clips_on_same_node() {
        let clips = vec![
            AnimationClip::new(Some("left".into()), vec![constant(AnimatedProperty::Translation, &[-2.0, 0.0, 0.0])]),
            AnimationClip::new(Some("right".into()), vec![constant(AnimatedProperty::Translation, &[4.0, 2.0, 0.0])]),
            AnimationClip::new(Some("turn".into()), vec![constant(AnimatedProperty::Rotation, &Quat::from_rotation_y(1.0).to_array())]),
            AnimationClip::new(Some("still".into()), vec![constant(AnimatedProperty::Rotation, &Quat::IDENTITY.to_array())]),
        ];
        let mut mixer = AnimationMixer::play_all(&clips, LoopMode::Repeat);
        let mut n = nodes();
        mixer.update(0.01, &clips, &mut n);

        assert!((n[0].pose.translation - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
        assert!(n[0].pose.rotation.angle_between(Quat::from_rotation_y(0.5)) < 1e-4);
    }

    #[test]
    fn test_mixer_weights_bias_the_average() {
        let clips = vec![
            AnimationClip::new(None, vec![constant(AnimatedProperty::Scale, &[1.0, 1.0, 1.0])]),
            AnimationClip::new(None, vec![constant(AnimatedProperty::Scale, &[5.0, 5.0, 5.0])]),
        ];
        let mut mixer = AnimationMixer::play_all(&clips, LoopMode::Repeat);
        mixer.actions[1].weight = 3.0;
        let mut n = nodes();
        mixer.update(0.01, &clips, &mut n);
        assert!((n[0].pose.scale - Vec3::splat(4.0)).length() < 1e-5);
    }

    #[test]
    fn test_mixer_partial_weight_mixes_with_rest_pose() {
        let clips = vec![AnimationClip::new(None, vec![constant(AnimatedProperty::Translation, &[2.0, 0.0, 0.0])])];
        let mut mixer = AnimationMixer::play_all(&clips, LoopMode::Repeat);
        mixer.actions[0].weight = 0.25;
        let mut n = nodes();
        n[0].pose.translation = Vec3::new(9.0, 9.0, 9.0);
        mixer.update(0.01, &clips, &mut n);
        assert!((n[0].pose.translation - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_zero_length_clip_holds_first_key() {
        let c = Channel {
            node: 0,
            property: AnimatedProperty::Translation,
            interpolation: Interpolation::Linear,
            keyframe_ts: vec![0.0],
            data: vec![1.0, 2.0, 3.0],
        };
        let clips = vec![AnimationClip::new(None, vec![c])];
        let mut mixer = AnimationMixer::play_all(&clips, LoopMode::Repeat);
        let mut n = nodes();
        mixer.update(0.01, &clips, &mut n);
        assert_eq!(mixer.actions[0].time, 0.0);
        assert_eq!(n[0].pose.translation, Vec3::new(1.0, 2.0, 3.0));
    }
}
