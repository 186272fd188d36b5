//! Constant-velocity Kalman filter on the ground plane, using ndarray with a nalgebra-based inverse.
//!
//! State is `[x, y, vx, vy]`; measurements are `[x, y]`.

use log::warn;
use ndarray::{Array1, Array2, array};

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    update_mat: Array2<f64>,
    std_position: f64,
    std_velocity: f64,
    std_measurement: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(0.1, 0.5, 0.1)
    }
}

impl KalmanFilter {
    /// `std_position` and `std_velocity` are process noise per second,
    /// `std_measurement` the observation noise, all in world units.
    pub fn new(std_position: f64, std_velocity: f64, std_measurement: f64) -> Self {
        let mut update_mat = Array2::zeros((2, 4));
        update_mat[[0, 0]] = 1.0;
        update_mat[[1, 1]] = 1.0;

        Self {
            update_mat,
            std_position,
            std_velocity,
            std_measurement,
        }
    }

    fn motion_mat(dt: f64) -> Array2<f64> {
        let mut motion_mat = Array2::eye(4);
        motion_mat[[0, 2]] = dt;
        motion_mat[[1, 3]] = dt;
        motion_mat
    }

    pub fn initiate(&self, measurement: [f64; 2]) -> (Array1<f64>, Array2<f64>) {
        let mean = array![measurement[0], measurement[1], 0.0, 0.0];

        let std = [
            2.0 * self.std_measurement,
            2.0 * self.std_measurement,
            10.0 * self.std_velocity,
            10.0 * self.std_velocity,
        ];
        (mean, diag(&std))
    }

    /// Advance the state by `dt` seconds.
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        dt: f64,
    ) -> (Array1<f64>, Array2<f64>) {
        let dt = dt.max(0.0);
        let std = [
            self.std_position * dt,
            self.std_position * dt,
            self.std_velocity * dt,
            self.std_velocity * dt,
        ];
        let motion_cov = diag(&std);
        let motion_mat = Self::motion_mat(dt);

        let new_mean = motion_mat.dot(mean);
        let new_covariance = motion_mat.dot(covariance).dot(&motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let innovation_cov = diag(&[self.std_measurement, self.std_measurement]);

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 2],
    ) -> (Array1<f64>, Array2<f64>) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let innovation = array![measurement[0], measurement[1]] - projected_mean;

        // K = P * H^T * S^-1
        let Some(s_inv) = invert_2x2(&projected_cov) else {
            warn!("singular innovation covariance; resetting track position to the measurement");
            let mut reset = mean.clone();
            reset[0] = measurement[0];
            reset[1] = measurement[1];
            return (reset, covariance.clone());
        };

        let pht = covariance.dot(&self.update_mat.t()); // 4x2
        let kalman_gain = pht.dot(&s_inv); // 4x2

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        (new_mean, new_covariance)
    }
}

fn diag(std: &[f64]) -> Array2<f64> {
    let mut m = Array2::zeros((std.len(), std.len()));
    for (i, s) in std.iter().enumerate() {
        m[[i, i]] = s * s;
    }
    m
}

/// Invert a 2x2 matrix using nalgebra (pure Rust).
fn invert_2x2(m: &Array2<f64>) -> Option<Array2<f64>> {
    let nm = nalgebra::Matrix2::new(m[[0, 0]], m[[0, 1]], m[[1, 0]], m[[1, 1]]);
    let inv = nm.try_inverse()?;
    let mut res = Array2::zeros((2, 2));
    for i in 0..2 {
        for j in 0..2 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}
