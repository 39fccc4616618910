//! Guillotine rectangle packing
//!
//! Best-short-side-fit placement into a free-rectangle list, splitting the
//! consumed free rectangle along its longer residual axis. The canvas
//! starts at the smallest power of two holding the largest request and
//! doubles its shorter side until everything fits.

/// One rectangle to place; dimensions include any padding.
#[derive(Debug, Clone, Copy)]
pub struct PackRequest {
    pub id: usize,
    pub width: u32,
    pub height: u32,
}

/// A placed rectangle.
#[derive(Debug, Clone, Copy)]
pub struct PackedRect {
    pub id: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Finished packing: canvas dimensions (powers of two) and placements.
#[derive(Debug, Clone)]
pub struct PackResult {
    pub width: u32,
    pub height: u32,
    pub rects: Vec<PackedRect>,
}

#[derive(Debug, Clone, Copy)]
struct FreeRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Pack `requests` into a power-of-two canvas no larger than `max_side` on
/// either axis. Returns `None` when even the largest allowed canvas cannot
/// hold them; rotation is never used.
pub fn pack_rects(requests: &[PackRequest], max_side: u32) -> Option<PackResult> {
    if requests.is_empty() {
        return Some(PackResult {
            width: 1,
            height: 1,
            rects: Vec::new(),
        });
    }

    // Largest first: big islands claim clean rectangles before
    // fragmentation sets in.
    let mut order: Vec<usize> = (0..requests.len()).collect();
    order.sort_by(|&a, &b| {
        let ka = requests[a].width.max(requests[a].height);
        let kb = requests[b].width.max(requests[b].height);
        kb.cmp(&ka)
    });

    let max_side = max_side.max(1).next_power_of_two();
    let first = &requests[order[0]];
    let mut width = first.width.next_power_of_two().clamp(64, max_side);
    let mut height = first.height.next_power_of_two().clamp(64, max_side);

    loop {
        if let Some(rects) = try_pack(requests, &order, width, height) {
            return Some(PackResult {
                width,
                height,
                rects,
            });
        }
        // grow the shorter side first to stay near-square
        if width <= height && width < max_side {
            width *= 2;
        } else if height < max_side {
            height *= 2;
        } else if width < max_side {
            width *= 2;
        } else {
            return None;
        }
    }
}

fn try_pack(
    requests: &[PackRequest],
    order: &[usize],
    width: u32,
    height: u32,
) -> Option<Vec<PackedRect>> {
    let mut free = vec![FreeRect {
        x: 0,
        y: 0,
        width,
        height,
    }];
    let mut placed = Vec::with_capacity(order.len());

    for &i in order {
        let req = &requests[i];
        let slot = best_short_side_fit(&free, req.width, req.height)?;
        let rect = free.swap_remove(slot);

        placed.push(PackedRect {
            id: req.id,
            x: rect.x,
            y: rect.y,
            width: req.width,
            height: req.height,
        });

        split_free_rect(&mut free, rect, req.width, req.height);
    }

    Some(placed)
}

/// Index of the free rectangle whose shorter leftover side is smallest.
fn best_short_side_fit(free: &[FreeRect], width: u32, height: u32) -> Option<usize> {
    let mut best = None;
    let mut best_short = u32::MAX;

    for (i, rect) in free.iter().enumerate() {
        if rect.width >= width && rect.height >= height {
            let short = (rect.width - width).min(rect.height - height);
            if short < best_short {
                best_short = short;
                best = Some(i);
            }
        }
    }
    best
}

/// Guillotine split along the longer residual axis.
fn split_free_rect(free: &mut Vec<FreeRect>, rect: FreeRect, used_w: u32, used_h: u32) {
    let right = rect.width - used_w;
    let below = rect.height - used_h;

    if right >= below {
        // vertical cut: the right strip takes the full height
        if right > 0 {
            free.push(FreeRect {
                x: rect.x + used_w,
                y: rect.y,
                width: right,
                height: rect.height,
            });
        }
        if below > 0 {
            free.push(FreeRect {
                x: rect.x,
                y: rect.y + used_h,
                width: used_w,
                height: below,
            });
        }
    } else {
        // horizontal cut: the bottom strip takes the full width
        if below > 0 {
            free.push(FreeRect {
                x: rect.x,
                y: rect.y + used_h,
                width: rect.width,
                height: below,
            });
        }
        if right > 0 {
            free.push(FreeRect {
                x: rect.x + used_w,
                y: rect.y,
                width: right,
                height: used_h,
            });
        }
    }
}
