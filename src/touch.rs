//! Touch event model.

/// One detected touch.
///
/// `location` is in taxel-index units (`0.0` is the centre of the first
/// taxel). A `size` of zero means the touch is absent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Touch {
    pub location: f32,
    pub size: f32,
}

impl Touch {
    pub fn new(location: f32, size: f32) -> Self {
        Self { location, size }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.size > 0.0
    }

    /// Location mapped to `[0, 1)` for a strip of `taxel_count` taxels.
    pub fn normalized_location(&self, taxel_count: usize) -> f32 {
        if taxel_count == 0 {
            return 0.0;
        }
        self.location / taxel_count as f32
    }
}

/// A bounded set of touches from one acquisition cycle.
///
/// Stored as two parallel arrays so the telemetry path can hand the slices
/// straight to a sink. Both arrays always have `capacity` entries; slots at or
/// past `active` are zero.
#[derive(Clone, Debug, PartialEq)]
pub struct TouchSet {
    locations: Vec<f32>,
    sizes: Vec<f32>,
    active: usize,
}

impl TouchSet {
    /// Create an empty set that can hold `capacity` touches
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            locations: vec![0.0; capacity],
            sizes: vec![0.0; capacity],
            active: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.locations.len()
    }

    /// Number of active touches
    #[inline]
    pub fn len(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn get(&self, index: usize) -> Option<Touch> {
        if index < self.active {
            Some(Touch::new(self.locations[index], self.sizes[index]))
        } else {
            None
        }
    }

    /// Active touches in detection order
    pub fn iter(&self) -> impl Iterator<Item = Touch> + '_ {
        self.locations[..self.active]
            .iter()
            .zip(&self.sizes[..self.active])
            .map(|(&location, &size)| Touch { location, size })
    }

    /// All location slots, including inactive (zeroed) ones.
    #[inline]
    pub fn locations(&self) -> &[f32] {
        &self.locations
    }

    /// All size slots, including inactive (zeroed) ones.
    #[inline]
    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn clear(&mut self) {
        self.locations.iter_mut().for_each(|l| *l = 0.0);
        self.sizes.iter_mut().for_each(|s| *s = 0.0);
        self.active = 0;
    }

    /// Append a touch. Returns `false` when the set is full or the touch is
    /// absent (size zero), in which case nothing is stored.
    pub fn push(&mut self, touch: Touch) -> bool {
        if self.active >= self.capacity() || !touch.is_active() {
            return false;
        }
        self.locations[self.active] = touch.location;
        self.sizes[self.active] = touch.size;
        self.active += 1;
        true
    }

    /// Overwrite this set with `other`. Does not allocate when both sets have
    /// the same capacity.
    pub fn copy_from(&mut self, other: &TouchSet) {
        if self.capacity() == other.capacity() {
            self.locations.copy_from_slice(&other.locations);
            self.sizes.copy_from_slice(&other.sizes);
            self.active = other.active;
        } else {
            self.clone_from(other);
        }
    }

    /// The size-weighted combination of every active touch.
    ///
    /// Useful when a single control value is wanted from a multi-touch
    /// surface. Returns an absent touch for an empty set.
    pub fn compound(&self) -> Touch {
        let total: f32 = self.sizes[..self.active].iter().sum();
        if total <= 0.0 {
            return Touch::default();
        }
        let weighted: f32 = self.iter().map(|t| t.location * t.size).sum();
        Touch::new(weighted / total, total)
    }
}
