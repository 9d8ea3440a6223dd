use crate::services::{RenderRequestError, RenderService};
use async_trait::async_trait;
use indexmap::IndexMap;

/// Name of the built-in channel post converter.
pub const CHANNEL_AUTOCONVERT: &str = "channel_autoconvert";

/// Optional behavior extension activated by name at startup
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called for every channel post. Returns the rendered image when the
    /// module handled the post.
    async fn on_channel_post(&self, _text: &str) -> Result<Option<Vec<u8>>, RenderRequestError> {
        Ok(None)
    }
}

/// Services handed to module factories
#[derive(Clone)]
pub struct ModuleContext {
    pub render: RenderService,
}

/// Constructor registered for a module name
pub type ModuleFactory = fn(&ModuleContext) -> Box<dyn Module>;

/// Modules resolved from the enabled module list
pub struct Activation {
    /// Instantiated modules, in activation order
    pub active: Vec<Box<dyn Module>>,

    /// Names with no registered factory
    pub unknown: Vec<String>,
}

impl Activation {
    pub fn names(&self) -> Vec<&'static str> {
        self.active.iter().map(|m| m.name()).collect()
    }

    /// Offer a channel post to every active module in order; the first
    /// module that produces an image wins.
    pub async fn dispatch_channel_post(&self, text: &str) -> Result<Option<Vec<u8>>, RenderRequestError> {
        for module in &self.active {
            if let Some(png) = module.on_channel_post(text).await? {
                return Ok(Some(png));
            }
        }
        Ok(None)
    }
}

/// Static registry mapping module names to factories
pub struct ModuleRegistry {
    factories: IndexMap<&'static str, ModuleFactory>,
}

impl ModuleRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Registry holding every module shipped with the crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CHANNEL_AUTOCONVERT, |ctx| {
            Box::new(ChannelAutoconvert::new(ctx.render.clone()))
        });
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry
    pub fn register(&mut self, name: &'static str, factory: ModuleFactory) {
        self.factories.insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Instantiate every enabled module
    ///
    /// Unknown names are logged and reported, never fatal. A name listed
    /// twice is activated once.
    pub fn activate<S: AsRef<str>>(&self, enabled: &[S], ctx: &ModuleContext) -> Activation {
        let mut activation = Activation {
            active: Vec::new(),
            unknown: Vec::new(),
        };

        for name in enabled {
            let name = name.as_ref();
            if activation.active.iter().any(|m| m.name() == name) {
                continue;
            }
            match self.factories.get(name) {
                Some(factory) => {
                    activation.active.push(factory(ctx));
                    tracing::info!("Activated module {}", name);
                }
                None => {
                    tracing::warn!("Unknown module {:?} in enabled_modules, skipping", name);
                    activation.unknown.push(name.to_string());
                }
            }
        }

        activation
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Converts every non-blank channel post to an image
pub struct ChannelAutoconvert {
    render: RenderService,
}

impl ChannelAutoconvert {
    pub fn new(render: RenderService) -> Self {
        Self { render }
    }
}

#[async_trait]
impl Module for ChannelAutoconvert {
    fn name(&self) -> &'static str {
        CHANNEL_AUTOCONVERT
    }

    async fn on_channel_post(&self, text: &str) -> Result<Option<Vec<u8>>, RenderRequestError> {
        match self.render.render_unattributed(text, None).await {
            Ok(png) => Ok(Some(png)),
            Err(RenderRequestError::EmptyInput) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
