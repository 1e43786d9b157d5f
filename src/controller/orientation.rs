use glam::{Mat3, Quat, Vec2, Vec3};

/// Exponentially damps the look-at target toward the pointer
#[derive(Debug, Clone)]
pub struct OrientationSmoother {
    pub target: Vec3,
    pub damping: f32,
}

impl OrientationSmoother {
    pub fn new(initial_target: Vec3, damping: f32) -> Self {
        Self { target: initial_target, damping }
    }

    /// One tick: move x/y a fixed fraction of the remaining distance. z is untouched.
    pub fn tick(&mut self, input: Vec2) -> Vec3 {
        self.target.x += (input.x - self.target.x) * self.damping;
        self.target.y += (input.y - self.target.y) * self.damping;
        self.target
    }
}

/// Rotation turning an object's local +Z toward `target`, with +Y as up.
///
/// Mirrors the usual look-at for non-camera objects: the object sits at `eye`
/// and its forward axis is +Z (cameras use -Z instead).
pub fn look_at_rotation(eye: Vec3, target: Vec3, up: Vec3) -> Quat {
    let mut z = target - eye;
    if z.length_squared() == 0.0 {
        z = Vec3::Z;
    }
    z = z.normalize();

    let mut x = up.cross(z);
    if x.length_squared() == 0.0 {
        // up and forward are parallel, nudge forward off the up axis
        if up.z.abs() == 1.0 {
            z.x += 0.0001;
        } else {
            z.z += 0.0001;
        }
        z = z.normalize();
        x = up.cross(z);
    }
    let x = x.normalize();
    let y = z.cross(x);

    Quat::from_mat3(&Mat3::from_cols(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_tick_moves_a_tenth() {
        let mut smoother = OrientationSmoother::new(Vec3::new(0.0, 0.0, 2.7), 0.1);
        let target = smoother.tick(Vec2::new(1.0, -1.0));
        assert!(close(target, Vec3::new(0.1, -0.1, 2.7)));
    }

    #[test]
    fn test_converges_geometrically() {
        let input = Vec2::new(0.8, -0.3);
        let start = Vec3::new(-0.5, 0.9, 2.7);
        let mut smoother = OrientationSmoother::new(start, 0.1);
        let initial_err = (start.truncate() - input).length();

        for n in 1..=60 {
            let t = smoother.tick(input);
            let expected = initial_err * 0.9f32.powi(n);
            let err = (t.truncate() - input).length();
            assert!((err - expected).abs() < 1e-4, "tick {n}: {err} vs {expected}");
            // never snaps
            assert!(err > 0.0);
            assert_eq!(t.z, 2.7);
        }
    }

    #[test]
    fn test_look_at_points_forward_axis() {
        let target = Vec3::new(0.3, -0.7, 2.7);
        let rot = look_at_rotation(Vec3::ZERO, target, Vec3::Y);
        assert!(close(rot * Vec3::Z, target.normalize()));
    }

    #[test]
    fn test_look_at_straight_ahead_is_identity() {
        let rot = look_at_rotation(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.7), Vec3::Y);
        assert!(close(rot * Vec3::X, Vec3::X));
        assert!(close(rot * Vec3::Y, Vec3::Y));
    }

    #[test]
    fn test_look_at_parallel_to_up() {
        let rot = look_at_rotation(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0), Vec3::Y);
        assert!(rot.is_finite());
        assert!((rot * Vec3::Z).y > 0.99);
    }
}
