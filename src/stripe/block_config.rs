//! Orders [`BlockConfig`] candidates "most efficient first". See spec.md §4.6.

use std::cmp::Ordering;

use crate::types::{BlockConfig, TensorShape, ALL_BLOCK_CONFIGS};

fn contains(block: BlockConfig, output_h: u32, output_w: u32) -> bool {
    block.height >= output_h && block.width >= output_w
}

/// Edge-utilisation score used when neither block fully contains the
/// output H×W: the block that leaves less unused edge wins.
fn edge_utilisation(block: BlockConfig, output_h: u32, output_w: u32) -> u32 {
    (output_h % block.height) + (output_w % block.width)
}

fn compare_blocks(a: BlockConfig, b: BlockConfig, output_h: u32, output_w: u32, weights_shape: TensorShape) -> Ordering {
    let a_contains = contains(a, output_h, output_w);
    let b_contains = contains(b, output_h, output_w);

    match (a_contains, b_contains) {
        (true, true) => (a.width * a.height).cmp(&(b.width * b.height)),
        (false, false) => {
            let a_edge = edge_utilisation(a, output_h, output_w);
            let b_edge = edge_utilisation(b, output_h, output_w);
            if a_edge != b_edge {
                return b_edge.cmp(&a_edge);
            }
            let wide_kernel = weights_shape.w > weights_shape.h;
            let (a_primary, b_primary) = if wide_kernel { (a.width, b.width) } else { (a.height, b.height) };
            if a_primary != b_primary {
                return b_primary.cmp(&a_primary);
            }
            let (a_secondary, b_secondary) = if wide_kernel { (a.height, b.height) } else { (a.width, b.width) };
            b_secondary.cmp(&a_secondary)
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
    }
}

/// Sorts the fixed set of hardware block configs for one output H×W,
/// preferring tightest-fitting blocks, then best edge utilisation.
/// `weights_shape` supplies the H/W used to break edge-utilisation ties.
pub fn sort_block_configs(output_h: u32, output_w: u32, weights_shape: TensorShape) -> Vec<BlockConfig> {
    let mut blocks = ALL_BLOCK_CONFIGS.to_vec();
    blocks.sort_by(|&a, &b| compare_blocks(a, b, output_h, output_w, weights_shape));
    blocks
}

/// Strategy 4 additionally stable-promotes blocks whose width equals its
/// fixed MCE output-stripe width, ahead of the base ordering.
pub fn promote_matching_width(mut blocks: Vec<BlockConfig>, mce_output_stripe_w: u32) -> Vec<BlockConfig> {
    blocks.sort_by_key(|b| b.width != mce_output_stripe_w);
    blocks
}
