use std::fmt::Write;

use super::constants::XTC_HEADER_SIZE;
use super::error::BoundsViolation;
use super::xtc_header::XtcHeader;

/// One container found by the walker. `data` borrows the bytes after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XtcNode<'a> {
    pub depth: usize,
    /// Offset of the header within the enclosing container's data
    pub offset: usize,
    pub header: XtcHeader,
    pub data: &'a [u8],
}

#[derive(Debug, Clone)]
struct Level<'a> {
    depth: usize,
    buffer: &'a [u8],
    offset: usize,
}

/// Lazy depth-first walk over a forest of Xtc containers.
///
/// Sibling order is byte order. A container of type `Xtc` is descended into
/// before its next sibling, as long as its depth is below the depth limit.
/// A container whose extent does not fit its buffer ends that level with a
/// single `BoundsViolation`; enclosing levels keep going.
#[derive(Debug, Clone)]
pub struct XtcWalker<'a> {
    stack: Vec<Level<'a>>,
    depth_limit: usize,
}

/// Walk every container in `payload`, recursing at most `depth_limit` levels
pub fn walk(payload: &[u8], depth_limit: usize) -> XtcWalker<'_> {
    XtcWalker {
        stack: vec![Level {
            depth: 0,
            buffer: payload,
            offset: 0,
        }],
        depth_limit,
    }
}

impl<'a> Iterator for XtcWalker<'a> {
    type Item = Result<XtcNode<'a>, BoundsViolation>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Level {
                depth,
                buffer,
                offset,
            } = self.stack.last()?.clone();

            // Fewer bytes left than a header: this level is done
            let header = match XtcHeader::decode(buffer, offset) {
                Ok(header) => header,
                Err(_) => {
                    self.stack.pop();
                    continue;
                }
            };

            let available = buffer.len() - offset;
            let extent = header.extent as usize;
            if extent < XTC_HEADER_SIZE || extent > available {
                self.stack.pop();
                let violation = BoundsViolation {
                    depth,
                    offset,
                    extent: header.extent,
                    available,
                };
                spdlog::warn!("Stopped walking level {depth}: {violation}");
                return Some(Err(violation));
            }

            let data = &buffer[offset + XTC_HEADER_SIZE..offset + extent];
            if let Some(level) = self.stack.last_mut() {
                level.offset = offset + extent;
            }
            if header.is_container() && depth < self.depth_limit {
                self.stack.push(Level {
                    depth: depth + 1,
                    buffer: data,
                    offset: 0,
                });
            }

            return Some(Ok(XtcNode {
                depth,
                offset,
                header,
                data,
            }));
        }
    }
}

/// Everything a complete walk found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport<'a> {
    pub nodes: Vec<XtcNode<'a>>,
    pub violations: Vec<BoundsViolation>,
}

impl<'a> WalkReport<'a> {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Run a walk to completion, separating the containers from the bounds violations
pub fn walk_xtc_tree(payload: &[u8], depth_limit: usize) -> WalkReport<'_> {
    let mut report = WalkReport::default();
    for item in walk(payload, depth_limit) {
        match item {
            Ok(node) => report.nodes.push(node),
            Err(violation) => report.violations.push(violation),
        }
    }
    report
}

/// Render the tree with two spaces of indentation per level
pub fn format_xtc_tree(payload: &[u8], depth_limit: usize) -> String {
    let mut out = String::new();
    for item in walk(payload, depth_limit) {
        let _ = match item {
            Ok(node) => writeln!(
                out,
                "{}{} v{} [{} bytes] src=0x{:08x}:0x{:08x} damage=0x{:08x}",
                "  ".repeat(node.depth),
                node.header.contains.kind(),
                node.header.contains.version(),
                node.header.extent,
                node.header.src.log,
                node.header.src.phy,
                node.header.damage.0,
            ),
            Err(violation) => writeln!(out, "{}!! {violation}", "  ".repeat(violation.depth)),
        };
    }
    out
}
