//! MP4 sample table resolution.
//!
//! Sample tables describe how samples are laid out in the file:
//! - stts: sample durations (decoding time)
//! - stss: sync sample table (keyframes)
//! - stsc: sample-to-chunk mapping
//! - stsz: sample sizes
//! - stco/co64: chunk offsets
//! - ctts: composition time offsets (for B-frames)

use std::collections::HashSet;

/// A resolved sample entry: where its payload lives and when it plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    /// Sample index (0-based).
    pub index: u32,
    /// File offset where sample data starts.
    pub offset: u64,
    /// Sample size in bytes.
    pub size: u32,
    /// Decode timestamp in media timescale.
    pub dts: u64,
    /// Sample duration in media timescale.
    pub duration: u32,
    /// Composition time offset (for PTS calculation).
    pub cts_offset: i32,
    /// Whether this sample is a keyframe (sync sample).
    pub is_keyframe: bool,
}

impl SampleEntry {
    /// Get the presentation timestamp, clamped to zero.
    pub fn pts(&self) -> u64 {
        (self.dts as i64 + self.cts_offset as i64).max(0) as u64
    }
}

/// Sample table containing resolved sample information.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    /// Sample count.
    pub sample_count: u32,
    /// All resolved samples, in decode order.
    pub samples: Vec<SampleEntry>,
}

impl SampleTable {
    /// Create a new sample table builder.
    pub fn builder() -> SampleTableBuilder {
        SampleTableBuilder::new()
    }

    /// Get sample by index.
    pub fn get(&self, index: u32) -> Option<&SampleEntry> {
        self.samples.get(index as usize)
    }

    /// Iterate over all samples.
    pub fn iter(&self) -> impl Iterator<Item = &SampleEntry> {
        self.samples.iter()
    }

    /// Find the keyframe at or before the given sample index.
    pub fn find_keyframe_at_or_before(&self, index: u32) -> Option<u32> {
        for i in (0..=index.min(self.sample_count.saturating_sub(1))).rev() {
            if let Some(sample) = self.samples.get(i as usize) {
                if sample.is_keyframe {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Find the sample that is presenting at `pts` (media timescale).
    ///
    /// That is the sample with the latest presentation time at or before
    /// `pts`, searched across the whole table since composition offsets can
    /// reorder samples. Equal presentation times resolve to the earlier
    /// sample in decode order. Times before every sample map to 0.
    pub fn find_sample_at_time(&self, pts: u64) -> Option<u32> {
        if self.samples.is_empty() {
            return None;
        }

        let presenting = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.pts() <= pts)
            .max_by_key(|(i, s)| (s.pts(), std::cmp::Reverse(*i)))
            .map_or(0, |(i, _)| i);

        Some(presenting as u32)
    }
}

/// Builder for constructing a sample table from raw atom data.
pub struct SampleTableBuilder {
    // stts: sample duration entries
    stts_entries: Vec<(u32, u32)>, // (count, delta)
    // stss: sync sample numbers (1-based)
    sync_samples: Vec<u32>,
    // stsc: sample-to-chunk entries
    stsc_entries: Vec<(u32, u32, u32)>, // (first_chunk, samples_per_chunk, sample_description_index)
    // stsz: sample sizes (if uniform_size > 0, all samples have that size)
    uniform_size: u32,
    uniform_count: u32,
    sample_sizes: Vec<u32>,
    // stco/co64: chunk offsets
    chunk_offsets: Vec<u64>,
    // ctts: composition time offsets
    ctts_entries: Vec<(u32, i32)>, // (count, offset)
}

impl SampleTableBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            stts_entries: Vec::new(),
            sync_samples: Vec::new(),
            stsc_entries: Vec::new(),
            uniform_size: 0,
            uniform_count: 0,
            sample_sizes: Vec::new(),
            chunk_offsets: Vec::new(),
            ctts_entries: Vec::new(),
        }
    }

    /// Set stts (decoding time to sample) entries.
    pub fn set_stts(&mut self, entries: Vec<(u32, u32)>) {
        self.stts_entries = entries;
    }

    /// Set stss (sync sample) entries.
    pub fn set_sync_samples(&mut self, samples: Vec<u32>) {
        self.sync_samples = samples;
    }

    /// Set stsc (sample to chunk) entries.
    pub fn set_stsc(&mut self, entries: Vec<(u32, u32, u32)>) {
        self.stsc_entries = entries;
    }

    /// Set stsz (sample size) data.
    ///
    /// `count` is the sample count declared by stsz; it matters only when
    /// `uniform_size` is non-zero and no per-sample sizes are present.
    pub fn set_stsz(&mut self, uniform_size: u32, count: u32, sizes: Vec<u32>) {
        self.uniform_size = uniform_size;
        self.uniform_count = count;
        self.sample_sizes = sizes;
    }

    /// Set chunk offsets (from stco or co64).
    pub fn set_chunk_offsets(&mut self, offsets: Vec<u64>) {
        self.chunk_offsets = offsets;
    }

    /// Set ctts (composition time to sample) entries.
    pub fn set_ctts(&mut self, entries: Vec<(u32, i32)>) {
        self.ctts_entries = entries;
    }

    /// Build the sample table by resolving all sample information.
    pub fn build(self) -> SampleTable {
        let sample_count = if self.uniform_size > 0 {
            if self.uniform_count > 0 {
                self.uniform_count
            } else {
                self.total_stts_samples() as u32
            }
        } else {
            self.sample_sizes.len() as u32
        };

        if sample_count == 0 {
            return SampleTable::default();
        }

        let mut samples = Vec::with_capacity(sample_count as usize);

        let sample_chunks = self.resolve_sample_chunks(sample_count);
        let offsets = self.resolve_offsets(&sample_chunks, sample_count);
        let (dts_values, durations) = self.resolve_timestamps(sample_count);
        let cts_offsets = self.resolve_cts_offsets(sample_count);

        let sync_set: HashSet<u32> = self.sync_samples.iter().copied().collect();

        for i in 0..sample_count {
            let is_keyframe = if self.sync_samples.is_empty() {
                // No stss means all samples are sync samples
                true
            } else {
                sync_set.contains(&(i + 1)) // stss uses 1-based indexing
            };

            samples.push(SampleEntry {
                index: i,
                offset: offsets.get(i as usize).copied().unwrap_or(0),
                size: self.size_of(i as usize),
                dts: dts_values.get(i as usize).copied().unwrap_or(0),
                duration: durations.get(i as usize).copied().unwrap_or(0),
                cts_offset: cts_offsets.get(i as usize).copied().unwrap_or(0),
                is_keyframe,
            });
        }

        SampleTable {
            sample_count,
            samples,
        }
    }

    fn size_of(&self, index: usize) -> u32 {
        if self.uniform_size > 0 {
            self.uniform_size
        } else {
            self.sample_sizes.get(index).copied().unwrap_or(0)
        }
    }

    fn total_stts_samples(&self) -> usize {
        self.stts_entries
            .iter()
            .map(|(count, _)| *count as usize)
            .sum()
    }

    fn resolve_sample_chunks(&self, sample_count: u32) -> Vec<u32> {
        if self.stsc_entries.is_empty() {
            return vec![0; sample_count as usize];
        }

        let mut result = Vec::with_capacity(sample_count as usize);
        let mut sample_idx = 0u32;
        let num_chunks = self.chunk_offsets.len() as u32;

        for i in 0..self.stsc_entries.len() {
            let (first_chunk, samples_per_chunk, _) = self.stsc_entries[i];
            let next_first = if i + 1 < self.stsc_entries.len() {
                self.stsc_entries[i + 1].0
            } else {
                num_chunks + 1
            };

            for chunk in first_chunk.max(1)..next_first {
                if chunk > num_chunks {
                    break;
                }
                for _ in 0..samples_per_chunk {
                    if sample_idx >= sample_count {
                        break;
                    }
                    result.push(chunk - 1); // Convert to 0-based
                    sample_idx += 1;
                }
            }
        }

        // Pad if needed
        while (result.len() as u32) < sample_count {
            result.push(result.last().copied().unwrap_or(0));
        }

        result
    }

    fn resolve_offsets(&self, sample_chunks: &[u32], sample_count: u32) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(sample_count as usize);
        let mut chunk_sample_offset = vec![0u64; self.chunk_offsets.len()];

        for i in 0..sample_count as usize {
            let chunk_idx = sample_chunks.get(i).copied().unwrap_or(0) as usize;
            let chunk_base = self.chunk_offsets.get(chunk_idx).copied().unwrap_or(0);
            let offset = chunk_base + chunk_sample_offset.get(chunk_idx).copied().unwrap_or(0);
            offsets.push(offset);

            if chunk_idx < chunk_sample_offset.len() {
                chunk_sample_offset[chunk_idx] += self.size_of(i) as u64;
            }
        }

        offsets
    }

    fn resolve_timestamps(&self, sample_count: u32) -> (Vec<u64>, Vec<u32>) {
        let mut dts_values = Vec::with_capacity(sample_count as usize);
        let mut durations = Vec::with_capacity(sample_count as usize);
        let mut current_dts = 0u64;
        let mut sample_idx = 0u32;

        for (count, delta) in &self.stts_entries {
            for _ in 0..*count {
                if sample_idx >= sample_count {
                    break;
                }
                dts_values.push(current_dts);
                durations.push(*delta);
                current_dts += *delta as u64;
                sample_idx += 1;
            }
        }

        // Pad with last duration if needed
        let last_duration = durations.last().copied().unwrap_or(1);
        while (dts_values.len() as u32) < sample_count {
            dts_values.push(current_dts);
            durations.push(last_duration);
            current_dts += last_duration as u64;
        }

        (dts_values, durations)
    }

    fn resolve_cts_offsets(&self, sample_count: u32) -> Vec<i32> {
        if self.ctts_entries.is_empty() {
            return vec![0; sample_count as usize];
        }

        let mut offsets = Vec::with_capacity(sample_count as usize);
        for (count, offset) in &self.ctts_entries {
            for _ in 0..*count {
                if offsets.len() >= sample_count as usize {
                    break;
                }
                offsets.push(*offset);
            }
        }

        while (offsets.len() as u32) < sample_count {
            offsets.push(0);
        }

        offsets
    }
}

impl Default for SampleTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
