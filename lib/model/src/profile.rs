use crate::ModelError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Describes the semantics of one value column of a profile, e.g. `cpu/nanoseconds`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueType {
    pub kind: String,
    pub unit: String,
}

impl ValueType {
    pub fn new(kind: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.unit)
    }
}

/// Index of a [Function] within [Profile::functions].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub usize);

/// Index of a [Location] within [Profile::locations].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Function {
    /// The demangled name.
    pub name: String,
    /// The name as it appears in the symbol table of the binary.
    pub system_name: String,
    pub filename: Option<PathBuf>,
}

/// A source line within a location. Line `0` means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Line {
    pub function: FunctionId,
    pub line: u32,
}

/// A program counter together with the (possibly inlined) source lines it belongs to.
///
/// `lines[0]` is the innermost inlined frame, the last entry is the caller that contains the
/// instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub address: u64,
    pub mapping: Option<usize>,
    pub lines: Vec<Line>,
}

/// A memory region of the profiled process that is backed by an object file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub start: u64,
    pub limit: u64,
    pub offset: u64,
    pub file: PathBuf,
}

impl Mapping {
    pub fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.limit
    }

    /// Translates a runtime address into the address space of the object file.
    pub fn object_address(&self, address: u64) -> u64 {
        address - self.start + self.offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Leaf first.
    pub locations: Vec<LocationId>,
    /// One value per entry of [Profile::sample_types].
    pub values: Vec<i64>,
    pub labels: BTreeMap<String, String>,
}

/// A decoded record of sampled program activity for one capture session.
#[derive(Debug, Clone)]
pub struct Profile {
    pub sample_types: Vec<ValueType>,
    pub default_sample_type: Option<String>,
    pub samples: Vec<Sample>,
    pub locations: Vec<Location>,
    pub functions: Vec<Function>,
    /// The main binary comes first.
    pub mappings: Vec<Mapping>,
    pub period_type: Option<ValueType>,
    pub period: i64,
    pub time: SystemTime,
    pub duration: Duration,
}

impl Profile {
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.0]
    }

    pub fn main_binary(&self) -> Option<&Mapping> {
        self.mappings.first()
    }

    /// Resolves a sample type selector to an index into [Profile::sample_types].
    ///
    /// An empty selector picks the default sample type or, if none is declared, the last one.
    /// Otherwise, the selector is either a numeric index or the kind of a sample type.
    pub fn sample_index(&self, selector: &str) -> Result<usize, ModelError> {
        let count = self.sample_types.len();
        if count == 0 {
            return Err(ModelError::NoSampleTypes);
        }
        let selector = match selector.trim() {
            "" => match &self.default_sample_type {
                Some(default) => default.as_str(),
                None => return Ok(count.saturating_sub(1)),
            },
            other => other,
        };

        if let Ok(index) = selector.parse::<usize>() {
            return if index < count {
                Ok(index)
            } else {
                Err(ModelError::SampleIndexOutOfRange(index, count))
            };
        }

        self.sample_types
            .iter()
            .position(|st| st.kind == selector)
            .ok_or_else(|| {
                let available = self
                    .sample_types
                    .iter()
                    .map(|st| st.kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                ModelError::UnknownSampleType(selector.to_owned(), available)
            })
    }

    /// Sum of the given value column over all samples.
    pub fn total(&self, sample_index: usize) -> i64 {
        self.samples
            .iter()
            .filter_map(|s| s.values.get(sample_index))
            .sum()
    }
}

/// Assembles a [Profile], interning functions and locations.
#[derive(Debug)]
pub struct ProfileBuilder {
    profile: Profile,
    functions: HashMap<Function, FunctionId>,
    locations: HashMap<(u64, Vec<Line>), LocationId>,
}

impl ProfileBuilder {
    pub fn new(sample_types: Vec<ValueType>) -> Self {
        Self {
            profile: Profile {
                sample_types,
                default_sample_type: None,
                samples: Vec::new(),
                locations: Vec::new(),
                functions: Vec::new(),
                mappings: Vec::new(),
                period_type: None,
                period: 0,
                time: SystemTime::now(),
                duration: Duration::ZERO,
            },
            functions: HashMap::new(),
            locations: HashMap::new(),
        }
    }

    #[must_use]
    pub fn default_sample_type(mut self, kind: impl Into<String>) -> Self {
        self.profile.default_sample_type = Some(kind.into());
        self
    }

    #[must_use]
    pub fn period(mut self, period_type: ValueType, period: i64) -> Self {
        self.profile.period_type = Some(period_type);
        self.profile.period = period;
        self
    }

    #[must_use]
    pub fn time(mut self, time: SystemTime, duration: Duration) -> Self {
        self.profile.time = time;
        self.profile.duration = duration;
        self
    }

    #[must_use]
    pub fn mappings(mut self, mappings: Vec<Mapping>) -> Self {
        self.profile.mappings = mappings;
        self
    }

    pub fn function(
        &mut self,
        name: impl Into<String>,
        system_name: impl Into<String>,
        filename: Option<PathBuf>,
    ) -> FunctionId {
        let function = Function {
            name: name.into(),
            system_name: system_name.into(),
            filename,
        };
        if let Some(id) = self.functions.get(&function) {
            return *id;
        }
        let id = FunctionId(self.profile.functions.len());
        self.profile.functions.push(function.clone());
        self.functions.insert(function, id);
        id
    }

    pub fn location(&mut self, address: u64, lines: Vec<Line>) -> LocationId {
        let key = (address, lines);
        if let Some(id) = self.locations.get(&key) {
            return *id;
        }
        let id = LocationId(self.profile.locations.len());
        let mapping = self
            .profile
            .mappings
            .iter()
            .position(|m| m.contains(address));
        self.profile.locations.push(Location {
            address,
            mapping,
            lines: key.1.clone(),
        });
        self.locations.insert(key, id);
        id
    }

    pub fn add_sample(
        &mut self,
        locations: Vec<LocationId>,
        values: Vec<i64>,
        labels: BTreeMap<String, String>,
    ) -> Result<(), ModelError> {
        let expected = self.profile.sample_types.len();
        if values.len() != expected {
            return Err(ModelError::ValueCountMismatch {
                expected,
                actual: values.len(),
            });
        }
        self.profile.samples.push(Sample {
            locations,
            values,
            labels,
        });
        Ok(())
    }

    pub fn build(self) -> Profile {
        self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_builder() -> ProfileBuilder {
        ProfileBuilder::new(vec![
            ValueType::new("samples", "count"),
            ValueType::new("cpu", "nanoseconds"),
        ])
    }

    #[test]
    fn interns_functions_and_locations() {
        let mut builder = cpu_builder();
        let main = builder.function("main", "main", None);
        let again = builder.function("main", "main", None);
        assert_eq!(main, again);

        let lines = vec![Line {
            function: main,
            line: 3,
        }];
        let first = builder.location(0x10, lines.clone());
        let second = builder.location(0x10, lines);
        assert_eq!(first, second);

        let profile = builder.build();
        assert_eq!(profile.functions.len(), 1);
        assert_eq!(profile.locations.len(), 1);
    }

    #[test]
    fn rejects_samples_with_wrong_value_count() {
        let mut builder = cpu_builder();
        let result = builder.add_sample(Vec::new(), vec![1], BTreeMap::new());
        assert!(matches!(
            result,
            Err(ModelError::ValueCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn sample_index_resolution() {
        let profile = cpu_builder().build();
        assert_eq!(profile.sample_index("").unwrap(), 1);
        assert_eq!(profile.sample_index("samples").unwrap(), 0);
        assert_eq!(profile.sample_index("0").unwrap(), 0);
        assert!(profile.sample_index("5").is_err());
        assert!(profile.sample_index("alloc_space").is_err());

        let profile = cpu_builder().default_sample_type("samples").build();
        assert_eq!(profile.sample_index("").unwrap(), 0);
    }

    #[test]
    fn profiles_without_sample_types_have_no_sample_index() {
        let profile = ProfileBuilder::new(Vec::new()).build();
        assert!(matches!(
            profile.sample_index(""),
            Err(ModelError::NoSampleTypes)
        ));
        assert!(matches!(
            profile.sample_index("0"),
            Err(ModelError::NoSampleTypes)
        ));
    }

    #[test]
    fn locations_pick_up_their_mapping() {
        let mut builder = cpu_builder().mappings(vec![Mapping {
            start: 0x1000,
            limit: 0x2000,
            offset: 0,
            file: PathBuf::from("/bin/app"),
        }]);
        let inside = builder.location(0x1500, Vec::new());
        let outside = builder.location(0x3000, Vec::new());
        let profile = builder.build();
        assert_eq!(profile.location(inside).mapping, Some(0));
        assert_eq!(profile.location(outside).mapping, None);
        assert_eq!(profile.mappings[0].object_address(0x1500), 0x500);
    }
}
