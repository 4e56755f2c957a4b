use opencv::{
    core::{Mat, Rect, Scalar, CV_8UC3},
    imgproc::{rectangle, FILLED, LINE_8},
    prelude::*,
};

/// BGR value inside the default blue range (HSV 120, 149, 70).
pub const BLUE_CONE: (f64, f64, f64) = (70.0, 29.0, 29.0);
/// BGR value inside the default yellow range (HSV 30, 255, 220).
pub const YELLOW_CONE: (f64, f64, f64) = (0.0, 220.0, 220.0);

/// Uniform gray frame, which matches neither color range.
pub fn gray_frame(width: i32, height: i32) -> Mat {
    Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(128.0)).unwrap()
}

pub fn draw_cone(frame: &mut Mat, rect: Rect, bgr: (f64, f64, f64)) {
    rectangle(frame, rect, Scalar::new(bgr.0, bgr.1, bgr.2, 0.0), FILLED, LINE_8, 0).unwrap();
}

pub fn frame_with_cones(blue: &[Rect], yellow: &[Rect]) -> Mat {
    let mut frame = gray_frame(640, 480);
    for rect in blue {
        draw_cone(&mut frame, *rect, BLUE_CONE);
    }
    for rect in yellow {
        draw_cone(&mut frame, *rect, YELLOW_CONE);
    }
    frame
}

/// Mean position of all non-zero pixels of a single channel mask.
pub fn foreground_mean(mask: &Mat) -> Option<(f64, f64)> {
    let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
    for r in 0..mask.rows() {
        for c in 0..mask.cols() {
            if *mask.at_2d::<u8>(r, c).unwrap() != 0 {
                sx += c as f64;
                sy += r as f64;
                n += 1;
            }
        }
    }

    (n > 0).then(|| (sx / n as f64, sy / n as f64))
}
