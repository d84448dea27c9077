//! Declarative registry of well-known descriptors and feature bundles.
//!
//! Entries are declared in a static table and refer to each other by key.
//! The table is turned into [`Descriptor`] values once, on first use, so no
//! declaration depends on another being initialised first. Features map a
//! storage backend name to the descriptors it needs at runtime.

use crate::descriptor::{Descriptor, DescriptorError, Relocation};
use crate::host::HostScope;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// One row of a registry table.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    /// Lookup key used by bundles and features.
    pub key: &'static str,
    /// Diagnostic name.
    pub name: &'static str,
    /// Group, with `{}` accepted for `.`.
    pub group: &'static str,
    /// Artifact identifier.
    pub artifact: &'static str,
    /// Version.
    pub version: &'static str,
    /// Base64 SHA-256 digest.
    pub checksum: &'static str,
    /// `(pattern, replacement)` relocation rules.
    pub relocations: &'static [(&'static str, &'static str)],
    /// Keys of bundled entries.
    pub bundled: &'static [&'static str],
    /// Drop this entry when the host already provides the keyed artifact.
    pub skip_if_host_provides: Option<&'static str>,
    /// Never inject into the host's ambient scope.
    pub isolated_only: bool,
}

impl RegistryEntry {
    const fn new(
        key: &'static str,
        name: &'static str,
        group: &'static str,
        artifact: &'static str,
        version: &'static str,
        checksum: &'static str,
    ) -> Self {
        Self {
            key,
            name,
            group,
            artifact,
            version,
            checksum,
            relocations: &[],
            bundled: &[],
            skip_if_host_provides: None,
            isolated_only: false,
        }
    }

    const fn relocating(mut self, relocations: &'static [(&'static str, &'static str)]) -> Self {
        self.relocations = relocations;
        self
    }

    const fn with(mut self, bundled: &'static [&'static str]) -> Self {
        self.bundled = bundled;
        self
    }

    const fn unless_host_provides(mut self, key: &'static str) -> Self {
        self.skip_if_host_provides = Some(key);
        self
    }

    const fn isolated(mut self) -> Self {
        self.isolated_only = true;
        self
    }
}

/// A named set of registry keys loaded together.
#[derive(Debug, Clone, Copy)]
pub struct FeatureBundle {
    /// Feature name, as given on the command line or in configuration.
    pub name: &'static str,
    /// Keys of the entries the feature needs, in load order.
    pub members: &'static [&'static str],
}

const KYORI: &[(&str, &str)] = &[("net{}kyori", "kyori")];

const PROVIDED_ENTRIES: &[RegistryEntry] = &[
    RegistryEntry::new(
        "asm",
        "ASM",
        "org{}ow2{}asm",
        "asm",
        "9.2",
        "udT+TXGTjfOIOfDspCqqpkz4sxPWeNoDbwyzyhmbR/U=",
    )
    .isolated(),
    RegistryEntry::new(
        "asm-commons",
        "ASM Commons",
        "org{}ow2{}asm",
        "asm-commons",
        "9.2",
        "vkzlMTiiOLtSLNeBz5Hzulzi9sqT7GLUahYqEnIl4KY=",
    )
    .with(&["asm"])
    .isolated(),
    RegistryEntry::new(
        "jar-relocator",
        "Jar Relocator",
        "me.lucko",
        "jar-relocator",
        "1.5",
        "0D6eM99gKpEYFNDydgnto3Df0ygZGdRVqy5ahtj0oIs=",
    )
    .with(&["asm", "asm-commons"])
    .isolated(),
    RegistryEntry::new(
        "kyori-examination",
        "Kyori Examination",
        "net{}kyori",
        "examination-api",
        "1.3.0",
        "ySN//ssFQo9u/4YhYkascM4LR7BMCOp8o1Ag/eV/hJI=",
    )
    .relocating(KYORI),
    RegistryEntry::new(
        "kyori-examination-string",
        "Kyori Examination Strings",
        "net{}kyori",
        "examination-string",
        "1.3.0",
        "fQH8JaS7OvDhZiaFRV9FQfv0YmIW6lhG5FXBSR4Va4w=",
    )
    .relocating(KYORI)
    .with(&["kyori-examination"]),
    RegistryEntry::new(
        "adventure-key",
        "Kyori Adventure Key",
        "net{}kyori",
        "adventure-key",
        "4.11.0",
        "cOLFKF2lI0NYV1sGWS76PCuWScqCzWxhdMEPtvboIRU=",
    )
    .relocating(KYORI)
    .with(&["kyori-examination", "kyori-examination-string"]),
    RegistryEntry::new(
        "adventure",
        "Kyori Adventure",
        "net{}kyori",
        "adventure-api",
        "4.11.0",
        "0Qi0I7JqoMraFpx+/jF+WNA5vcd/5hMgD3mhAC6IaWU=",
    )
    .relocating(KYORI)
    .with(&["kyori-examination", "kyori-examination-string"]),
    RegistryEntry::new(
        "adventure-gson-serializer",
        "Kyori Adventure GSON Serializer",
        "net{}kyori",
        "adventure-text-serializer-gson",
        "4.11.0",
        "gT2pfqvYUZfF+xJDT+KD93QFRkxi6we7v970o1nK1Jo=",
    )
    .relocating(KYORI)
    .with(&["adventure"]),
    RegistryEntry::new(
        "typesafe-config",
        "Typesafe Config",
        "com.typesafe",
        "config",
        "1.4.0",
        "qtv9WlJFUb7vENP4kdMFuDuyfVRwPZpN56yioS2YR+I=",
    )
    .relocating(&[("com{}typesafe{}config", "typesafe.config")]),
    RegistryEntry::new(
        "hikari",
        "Hikari",
        "com{}zaxxer",
        "HikariCP",
        "4.0.3",
        "fAJK7/HBBjV210RTUT+d5kR9jmJNF/jifzCi6XaIxsk=",
    )
    .relocating(&[("com{}zaxxer{}hikari", "hikari")]),
    RegistryEntry::new(
        "h2",
        "H2",
        "com.h2database",
        "h2",
        "1.4.199",
        "MSWhZ0O8a0z7thq7p4MgPx+2gjCqD9yXiY95b5ml1C4=",
    )
    .isolated(),
    RegistryEntry::new(
        "mariadb",
        "MariaDB",
        "org{}mariadb{}jdbc",
        "mariadb-java-client",
        "2.7.2",
        "o/Z3bfCELPZefxWFFQEtUwfalJ9mBCKC4e5EdN0Z9Eg=",
    )
    .relocating(&[("org{}mariadb{}jdbc", "mariadb")]),
    RegistryEntry::new(
        "mysql",
        "MySQL",
        "mysql",
        "mysql-connector-java",
        "8.0.23",
        "/31bQCr9OcEnh0cVBaM6MEEDsjjsG3pE6JNtMynadTU=",
    )
    .relocating(&[("com{}mysql", "mysql")]),
    RegistryEntry::new(
        "mongodb",
        "MongoDB",
        "org.mongodb",
        "mongo-java-driver",
        "3.12.2",
        "eMxHcEtasb/ubFCv99kE5rVZMPGmBei674ZTdjYe58w=",
    )
    .relocating(&[("com.mongodb", "mongodb"), ("org.bson", "bson")]),
    RegistryEntry::new(
        "bytebuddy",
        "ByteBuddy",
        "net{}bytebuddy",
        "byte-buddy",
        "1.10.9",
        "B7nKbi+XDLA/SyVlHfHy/OJx1JG0TgQJgniHeG9pLU0=",
    )
    .relocating(&[("net{}bytebuddy", "bytebuddy")]),
    RegistryEntry::new(
        "flow-math",
        "Flowpowered Math",
        "com{}flowpowered",
        "flow-math",
        "1.0.3",
        "3qIBAx92YOvMdgQTZdeNdLm/s2+uxw0+oNz8UD09xnQ=",
    )
    .relocating(&[("com.flowpowered.math", "flowmath")]),
    RegistryEntry::new(
        "sponge-math",
        "SpongePowered Math",
        "org.spongepowered",
        "math",
        "2.0.1",
        "T5SBxcKJtCF1dzARPWlVQn+1qqqGdYA86EPhMiuhnUM=",
    ),
    RegistryEntry::new(
        "slf4j-api",
        "SLF4J API",
        "org.slf4j",
        "slf4j-api",
        "1.7.30",
        "zboHlk0btAoHYUhcax6ML4/Z6x0ZxTkorA1/lRAQXFc=",
    )
    .relocating(&[("org{}slf4j", "slf4j")])
    .unless_host_provides("slf4j-api"),
    RegistryEntry::new(
        "slf4j-simple",
        "SLF4J Simple",
        "org.slf4j",
        "slf4j-simple",
        "1.7.30",
        "i5J5y/9rn4hZTvrjzwIDm2mVAw7sAj7UOSh0jEFnD+4=",
    )
    .with(&["slf4j-api"])
    .unless_host_provides("slf4j-api"),
    RegistryEntry::new(
        "javassist",
        "Javassist",
        "org.javassist",
        "javassist",
        "3.28.0-GA",
        "V9Cp6ShvgvTqqFESUYaZf4Eb784OIGD/ChWnf1qd2ac=",
    ),
    RegistryEntry::new(
        "reflections",
        "Reflections",
        "org.reflections",
        "reflections",
        "0.10.2",
        "k4otCP5UBQ12ELlE2N3DoJNVcQ2ea+CqyDjbwE6aKCU=",
    )
    .relocating(&[("org{}reflections", "reflections")])
    .with(&["javassist"]),
    RegistryEntry::new(
        "caffeine",
        "Caffeine",
        "com{}github{}ben-manes{}caffeine",
        "caffeine",
        "2.8.4",
        "KV9YN5gQj6b507VJApJpPF5PkCon0DZqAi0T7Ln0lag=",
    )
    .relocating(&[("com{}github{}benmanes{}caffeine", "caffeine")]),
];

const PROVIDED_FEATURES: &[FeatureBundle] = &[
    FeatureBundle {
        name: "mongodb",
        members: &["mongodb"],
    },
    FeatureBundle {
        name: "mariadb",
        members: &["mariadb", "slf4j-api", "slf4j-simple", "hikari"],
    },
    FeatureBundle {
        name: "mysql",
        members: &["mysql", "slf4j-api", "slf4j-simple", "hikari"],
    },
    FeatureBundle {
        name: "h2",
        members: &["h2"],
    },
];

/// Decides whether a loaded artifact is injected into the host scope.
pub trait LoadPolicy: Send + Sync {
    /// `true` to expose `descriptor` to the host's ambient scope.
    fn should_auto_load(&self, descriptor: &Descriptor) -> bool;
}

/// Policy that exposes every loaded artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoLoadAll;

impl LoadPolicy for AutoLoadAll {
    fn should_auto_load(&self, _descriptor: &Descriptor) -> bool {
        true
    }
}

/// Policy that holds back a fixed set of isolated-only descriptors.
#[derive(Debug, Clone, Default)]
pub struct IsolatedOnlyPolicy {
    isolated: BTreeSet<Descriptor>,
}

impl IsolatedOnlyPolicy {
    /// Hold back every descriptor in `isolated`.
    #[must_use]
    pub fn new(isolated: impl IntoIterator<Item = Descriptor>) -> Self {
        Self {
            isolated: isolated.into_iter().collect(),
        }
    }
}

impl LoadPolicy for IsolatedOnlyPolicy {
    fn should_auto_load(&self, descriptor: &Descriptor) -> bool {
        !self.isolated.contains(descriptor)
    }
}

/// Immutable lookup of descriptors and feature bundles.
#[derive(Debug)]
pub struct Registry {
    entries: &'static [RegistryEntry],
    descriptors: BTreeMap<&'static str, Descriptor>,
    features: &'static [FeatureBundle],
}

impl Registry {
    /// The built-in registry, constructed on first use.
    ///
    /// # Errors
    ///
    /// Returns the declaration error if the built-in table is invalid.
    pub fn provided() -> Result<&'static Self, DescriptorError> {
        static PROVIDED: OnceLock<Result<Registry, DescriptorError>> = OnceLock::new();
        PROVIDED
            .get_or_init(|| Self::from_table(PROVIDED_ENTRIES, PROVIDED_FEATURES))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Build a registry from a declaration table.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::UnknownBundledKey`] for a bundle or feature
    /// naming an undeclared key, [`DescriptorError::BundleCycle`] for
    /// entries that bundle each other, and any error from building an entry.
    pub fn from_table(
        entries: &'static [RegistryEntry],
        features: &'static [FeatureBundle],
    ) -> Result<Self, DescriptorError> {
        let mut builder = TableResolver {
            entries,
            built: BTreeMap::new(),
            visiting: Vec::new(),
        };
        for entry in entries {
            builder.resolve(entry.key, entry.key)?;
        }
        for feature in features {
            for member in feature.members {
                if !builder.built.contains_key(member) {
                    return Err(DescriptorError::UnknownBundledKey {
                        entry: feature.name.to_owned(),
                        key: (*member).to_owned(),
                    });
                }
            }
        }
        Ok(Self {
            entries,
            descriptors: builder.built,
            features,
        })
    }

    /// Look up a descriptor by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Descriptor> {
        self.descriptors.get(key)
    }

    /// All `(key, descriptor)` pairs in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &Descriptor)> + '_ {
        self.entries
            .iter()
            .filter_map(|entry| self.descriptors.get(entry.key).map(|d| (entry.key, d)))
    }

    /// Declared feature bundles.
    #[must_use]
    pub fn features(&self) -> &'static [FeatureBundle] {
        self.features
    }

    /// Resolve feature names into an ordered, de-duplicated descriptor list.
    ///
    /// Entries marked to be skipped when the host already provides an
    /// artifact are dropped if `host` reports it.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::UnknownFeature`] for an undeclared name.
    pub fn resolve_features<S: AsRef<str>>(
        &self,
        features: &[S],
        host: &dyn HostScope,
    ) -> Result<Vec<Descriptor>, DescriptorError> {
        let mut keys: Vec<&'static str> = Vec::new();
        for name in features {
            let name = name.as_ref();
            let bundle = self
                .features
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| DescriptorError::UnknownFeature {
                    name: name.to_owned(),
                    expected: self.feature_names(),
                })?;
            for member in bundle.members {
                if !keys.contains(member) {
                    keys.push(*member);
                }
            }
        }

        Ok(keys
            .into_iter()
            .filter(|key| !self.host_provides(key, host))
            .filter_map(|key| self.descriptors.get(key).cloned())
            .collect())
    }

    /// Policy that holds back every entry marked isolated-only.
    #[must_use]
    pub fn auto_load_policy(&self) -> IsolatedOnlyPolicy {
        IsolatedOnlyPolicy::new(
            self.entries
                .iter()
                .filter(|entry| entry.isolated_only)
                .filter_map(|entry| self.descriptors.get(entry.key).cloned()),
        )
    }

    fn host_provides(&self, key: &str, host: &dyn HostScope) -> bool {
        let Some(probe) = self
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.skip_if_host_provides)
            .and_then(|probe| self.descriptors.get(probe))
        else {
            return false;
        };
        let provided = host.provides(probe);
        if provided {
            debug!("host already provides {probe}; skipping {key}");
        }
        provided
    }

    fn feature_names(&self) -> String {
        self.features
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

struct TableResolver {
    entries: &'static [RegistryEntry],
    built: BTreeMap<&'static str, Descriptor>,
    visiting: Vec<&'static str>,
}

impl TableResolver {
    fn resolve(
        &mut self,
        key: &'static str,
        from: &'static str,
    ) -> Result<Descriptor, DescriptorError> {
        if let Some(done) = self.built.get(key) {
            return Ok(done.clone());
        }
        if self.visiting.contains(&key) {
            return Err(DescriptorError::BundleCycle {
                entry: key.to_owned(),
                via: from.to_owned(),
            });
        }
        let entries = self.entries;
        let entry = entries
            .iter()
            .find(|entry| entry.key == key)
            .ok_or_else(|| DescriptorError::UnknownBundledKey {
                entry: from.to_owned(),
                key: key.to_owned(),
            })?;

        self.visiting.push(key);
        let mut builder = Descriptor::builder()
            .name(entry.name)
            .group(entry.group)
            .artifact(entry.artifact)
            .version(entry.version)
            .checksum_base64(entry.checksum)?;
        for (pattern, replacement) in entry.relocations {
            builder = builder.relocation(Relocation::new(pattern, replacement));
        }
        for bundled in entry.bundled {
            builder = builder.with(self.resolve(*bundled, key)?);
        }
        self.visiting.pop();

        let descriptor = builder.build()?;
        self.built.insert(key, descriptor.clone());
        Ok(descriptor)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
