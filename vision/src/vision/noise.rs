use opencv::{
    core::{Mat, Point, Size, BORDER_CONSTANT},
    imgproc::{
        canny_def, dilate, gaussian_blur_def, get_structuring_element_def, morphology_default_border_value,
        morphology_ex_def, MORPH_CLOSE, MORPH_OPEN, MORPH_RECT,
    },
};

use crate::config::NoiseStrategy;

/// Cleans salt and pepper noise from a binary mask. The structuring element is
/// built once per run.
pub struct NoiseReducer {
    strategy: NoiseStrategy,
    kernel: Mat,
}

impl NoiseReducer {
    pub fn new(strategy: NoiseStrategy) -> anyhow::Result<Self> {
        strategy.validate()?;
        let kernel = match strategy {
            NoiseStrategy::OpenClose { kernel_size } => {
                get_structuring_element_def(MORPH_RECT, Size::new(kernel_size, kernel_size))?
            }
            // 3x3 like a default-constructed dilation kernel
            NoiseStrategy::BlurEdges { .. } => get_structuring_element_def(MORPH_RECT, Size::new(3, 3))?,
        };

        Ok(Self { strategy, kernel })
    }

    pub fn strategy(&self) -> NoiseStrategy {
        self.strategy
    }

    pub fn reduce(&self, mask: &Mat) -> anyhow::Result<Mat> {
        match self.strategy {
            NoiseStrategy::OpenClose { .. } => self.open_close(mask),
            NoiseStrategy::BlurEdges {
                blur_kernel,
                dilate_iterations,
                low_threshold,
                high_threshold,
            } => self.blur_edges(mask, blur_kernel, dilate_iterations, low_threshold, high_threshold),
        }
    }

    fn open_close(&self, mask: &Mat) -> anyhow::Result<Mat> {
        let mut opened = Mat::default();
        morphology_ex_def(mask, &mut opened, MORPH_OPEN, &self.kernel)?;
        let mut closed = Mat::default();
        morphology_ex_def(&opened, &mut closed, MORPH_CLOSE, &self.kernel)?;

        Ok(closed)
    }

    fn blur_edges(
        &self,
        mask: &Mat,
        blur_kernel: i32,
        dilate_iterations: i32,
        low_threshold: f64,
        high_threshold: f64,
    ) -> anyhow::Result<Mat> {
        let mut blurred = Mat::default();
        gaussian_blur_def(mask, &mut blurred, Size::new(blur_kernel, blur_kernel), 0.0)?;

        let mut dilated = Mat::default();
        dilate(
            &blurred,
            &mut dilated,
            &self.kernel,
            Point::new(-1, -1),
            dilate_iterations,
            BORDER_CONSTANT,
            morphology_default_border_value()?,
        )?;

        let mut edges = Mat::default();
        canny_def(&dilated, &mut edges, low_threshold, high_threshold)?;

        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use opencv::{
        core::{absdiff, count_non_zero, Rect, Scalar, CV_8UC1},
        imgproc::{rectangle, FILLED, LINE_8},
        prelude::*,
    };

    use super::*;

    fn noisy_mask() -> Mat {
        let mut mask = Mat::new_rows_cols_with_default(120, 160, CV_8UC1, Scalar::all(0.0)).unwrap();
        for rect in [Rect::new(20, 30, 40, 30), Rect::new(100, 40, 30, 50)] {
            rectangle(&mut mask, rect, Scalar::all(255.0), FILLED, LINE_8, 0).unwrap();
        }
        // specks
        *mask.at_2d_mut::<u8>(5, 5).unwrap() = 255;
        *mask.at_2d_mut::<u8>(100, 80).unwrap() = 255;
        // pinhole inside the first blob
        *mask.at_2d_mut::<u8>(45, 40).unwrap() = 0;
        mask
    }

    fn changed_pixels(a: &Mat, b: &Mat) -> i32 {
        let mut diff = Mat::default();
        absdiff(a, b, &mut diff).unwrap();
        count_non_zero(&diff).unwrap()
    }

    #[test]
    fn open_close_removes_specks_and_fills_holes() {
        let reducer = NoiseReducer::new(NoiseStrategy::OpenClose { kernel_size: 5 }).unwrap();
        let cleaned = reducer.reduce(&noisy_mask()).unwrap();

        assert_eq!(*cleaned.at_2d::<u8>(5, 5).unwrap(), 0);
        assert_eq!(*cleaned.at_2d::<u8>(100, 80).unwrap(), 0);
        assert_eq!(*cleaned.at_2d::<u8>(45, 40).unwrap(), 255);
        assert_eq!(count_non_zero(&cleaned).unwrap(), 40 * 30 + 30 * 50);
    }

    #[test]
    fn open_close_is_idempotent_once_stable() {
        let reducer = NoiseReducer::new(NoiseStrategy::default()).unwrap();
        let once = reducer.reduce(&noisy_mask()).unwrap();
        let twice = reducer.reduce(&once).unwrap();

        assert_eq!(changed_pixels(&once, &twice), 0);
    }

    #[test]
    fn blur_edges_produces_outlines() {
        let reducer = NoiseReducer::new(NoiseStrategy::blur_edges()).unwrap();
        let edges = reducer.reduce(&noisy_mask()).unwrap();

        // interior of the large blob is not an edge
        assert_eq!(*edges.at_2d::<u8>(45, 40).unwrap(), 0);
        assert!(count_non_zero(&edges).unwrap() > 0);
    }

    #[test]
    fn zero_kernel_is_rejected() {
        assert!(NoiseReducer::new(NoiseStrategy::OpenClose { kernel_size: 0 }).is_err());
    }
}
