use opencv::{core::Mat, prelude::*};

use crate::utils::count_foreground;

/// Which half of the rectified view the blue cones were first seen in.
/// Yellow is assumed to be on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeSide {
    BlueLeft,
    BlueRight,
}

pub struct SideDisambiguator;

impl SideDisambiguator {
    /// Splits the mask at the vertical midline and compares foreground counts.
    /// Ties go to the left.
    pub fn decide(blue_mask: &Mat) -> anyhow::Result<ConeSide> {
        let midline = blue_mask.cols() / 2;
        let left = count_foreground(blue_mask, 0..midline)?;
        let right = count_foreground(blue_mask, midline..blue_mask.cols())?;
        log::debug!("Blue foreground: {left} left of midline, {right} right of it");

        Ok(if left >= right { ConeSide::BlueLeft } else { ConeSide::BlueRight })
    }
}

/// Write-once side decision. It is taken on the first frame that has a blue
/// detection and never revisited, which assumes the vehicle does not turn
/// around during a run.
#[derive(Debug, Default, Clone)]
pub struct SideAssumption {
    side: Option<ConeSide>,
}

impl SideAssumption {
    pub fn get(&self) -> Option<ConeSide> {
        self.side
    }

    pub fn observe(&mut self, blue_mask: &Mat, blue_detected: bool) -> anyhow::Result<Option<ConeSide>> {
        if self.side.is_none() && blue_detected {
            let side = SideDisambiguator::decide(blue_mask)?;
            log::info!("Side assumption fixed: {side:?}");
            self.side = Some(side);
        }

        Ok(self.side)
    }
}
