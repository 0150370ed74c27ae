//! Byte segment planning.

use crate::utils::content_length::range_header;

/// An inclusive byte range `[start, end]` fetched by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSegment {
    /// Position of the segment in the plan.
    pub index: usize,
    /// First byte of the segment.
    pub start: u64,
    /// Last byte of the segment, inclusive.
    pub end: u64,
}

impl ByteSegment {
    /// Number of bytes in the segment.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Segments always hold at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Range` request header.
    pub fn range_header(&self) -> String {
        range_header(self.start, self.end)
    }
}

/// Segmentation thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSettings {
    /// Smallest resource for which a segmented download is attempted.
    pub parallel_threshold: u64,
    /// Upper bound on concurrent segments.
    pub max_segments: usize,
    /// Smallest segment worth a request of its own.
    pub min_segment_size: u64,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            parallel_threshold: 4 * 1024 * 1024,
            max_segments: 4,
            min_segment_size: 1024 * 1024,
        }
    }
}

impl SegmentSettings {
    /// Number of segments to use for a resource of `total` bytes.
    ///
    /// At least 2 and at most [`max_segments`](Self::max_segments), never
    /// more than there are bytes.
    pub fn segment_count(&self, total: u64) -> usize {
        if total == 0 {
            return 0;
        }
        let by_size = total / self.min_segment_size.max(1);
        let count = by_size
            .max(2)
            .min(self.max_segments.max(1) as u64)
            .min(total);
        count as usize
    }
}

/// Split `[0, total)` into contiguous segments.
///
/// Every segment has the same length except the last one, which absorbs the
/// remainder.
pub fn plan_segments(total: u64, settings: &SegmentSettings) -> Vec<ByteSegment> {
    let count = settings.segment_count(total);
    if count == 0 {
        return Vec::new();
    }

    let size = total / count as u64;
    (0..count)
        .map(|index| {
            let start = index as u64 * size;
            let end = match index + 1 == count {
                true => total - 1,
                false => start + size - 1,
            };
            ByteSegment { index, start, end }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn assert_partition(total: u64, segments: &[ByteSegment]) {
        let mut next = 0;
        for (i, s) in segments.iter().enumerate() {
            assert_eq!(s.index, i);
            assert_eq!(s.start, next, "gap or overlap before segment {}", i);
            assert!(s.end >= s.start);
            next = s.end + 1;
        }
        assert_eq!(next, total);
        assert_eq!(segments.iter().map(ByteSegment::len).sum::<u64>(), total);
    }

    #[test]
    fn test_segment_count_bounds() {
        let settings = SegmentSettings::default();
        assert_eq!(settings.segment_count(0), 0);
        assert_eq!(settings.segment_count(1), 1);
        assert_eq!(settings.segment_count(3), 2);
        assert_eq!(settings.segment_count(MIB), 2);
        assert_eq!(settings.segment_count(3 * MIB), 3);
        assert_eq!(settings.segment_count(10 * MIB), 4);
        assert_eq!(settings.segment_count(u64::MAX), 4);
    }

    #[test]
    fn test_partition_is_exact() {
        let settings = SegmentSettings::default();
        for total in [1, 2, 3, 7, 1000, MIB - 1, MIB, 3 * MIB + 17, 10 * MIB, 10 * MIB + 3] {
            assert_partition(total, &plan_segments(total, &settings));
        }
    }

    #[test]
    fn test_last_segment_absorbs_remainder() {
        let segments = plan_segments(10 * MIB + 3, &SegmentSettings::default());
        assert_eq!(segments.len(), 4);
        let first = segments[0].len();
        assert!(segments[..3].iter().all(|s| s.len() == first));
        assert_eq!(segments[3].len(), first + 3);
    }

    #[test]
    fn test_range_header() {
        let segment = ByteSegment {
            index: 0,
            start: 0,
            end: 1023,
        };
        assert_eq!(segment.range_header(), "bytes=0-1023");
        assert_eq!(segment.len(), 1024);
    }
}
