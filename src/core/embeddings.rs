use std::path::Path;

use image::DynamicImage;
use ndarray::Array1;

use crate::error::{MatchError, Result};
use crate::state::{Config, EmbedderKind};

/// A fixed-length feature vector describing one image
pub type Embedding = Array1<f32>;

/// ImageNet channel means, used by both embedders
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Maps images to embeddings
///
/// One instance is built per run and handed to everything that needs it.
pub trait Embedder {
    /// Short identifier, recorded in caches and reports
    fn name(&self) -> &str;

    /// Length of every embedding this embedder produces
    fn dimension(&self) -> usize;

    /// Embed an already decoded image
    fn embed_image(&self, img: &DynamicImage) -> Result<Embedding>;

    /// Decode and embed the image at `path`
    ///
    /// Every failure, from opening the file to inference, is reported as
    /// [`MatchError::Embedding`] naming the file.
    fn embed(&self, path: &Path) -> Result<Embedding> {
        let img = image::open(path).map_err(|e| MatchError::embedding(path, e))?;
        self.embed_image(&img).map_err(|e| match e {
            err @ MatchError::Embedding { .. } => err,
            other => MatchError::embedding(path, other),
        })
    }
}

/// Build the embedder selected by `config`
pub fn from_config(config: &Config) -> Result<Box<dyn Embedder>> {
    match config.embedder {
        EmbedderKind::Pixel => Ok(Box::new(PixelEmbedder::new(config.pixel_size)?)),
        #[cfg(feature = "embeddings")]
        EmbedderKind::Resnet => {
            let weights = config.weights.as_deref().ok_or_else(|| {
                MatchError::Config(
                    "the resnet embedder needs a weights file (IMAGEMATCH_WEIGHTS or --weights)"
                        .to_string(),
                )
            })?;
            Ok(Box::new(ResNetEmbedder::load(weights, config.image_size)?))
        }
        #[cfg(not(feature = "embeddings"))]
        EmbedderKind::Resnet => Err(MatchError::Config(
            "the resnet embedder requires building with the `embeddings` feature".to_string(),
        )),
    }
}

/// Resize to `width`x`height` and lay out normalised pixels channel-first (CHW)
fn normalized_chw(img: &DynamicImage, width: u32, height: u32) -> Vec<f32> {
    let img = img.resize_exact(width, height, image::imageops::FilterType::Triangle);
    let rgb_img = img.to_rgb8();

    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (i, pixel) in rgb_img.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }
    data
}

/// Embeds an image as its normalised RGB thumbnail
///
/// No model is involved, so this works everywhere and is fully deterministic.
#[derive(Clone, Debug)]
pub struct PixelEmbedder {
    side: u32,
    name: String,
}

impl PixelEmbedder {
    /// Thumbnails of `side`x`side` pixels
    pub fn new(side: u32) -> Result<Self> {
        if side == 0 {
            return Err(MatchError::InvalidInput(
                "pixel embedder side must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            side,
            name: format!("pixel-{}", side),
        })
    }
}

impl Embedder for PixelEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        (self.side * self.side * 3) as usize
    }

    fn embed_image(&self, img: &DynamicImage) -> Result<Embedding> {
        Ok(Array1::from(normalized_chw(img, self.side, self.side)))
    }
}

#[cfg(feature = "embeddings")]
pub use self::resnet::ResNetEmbedder;

#[cfg(feature = "embeddings")]
mod resnet {
    use std::fmt;
    use std::path::Path;

    use image::DynamicImage;
    use ndarray::Array1;
    use tch::nn::{self, ModuleT};
    use tch::{vision::resnet, Device, Kind, Tensor};

    use super::{normalized_chw, Embedder, Embedding};
    use crate::error::{MatchError, Result};

    /// Output width of ResNet-50 after global average pooling
    const RESNET50_FEATURES: usize = 2048;

    /// ResNet-50 without its classifier; one pooled 2048-d vector per image
    pub struct ResNetEmbedder {
        // Keeps the weights alive for `model`.
        _vs: nn::VarStore,
        model: nn::FuncT<'static>,
        device: Device,
        image_size: u32,
    }

    impl fmt::Debug for ResNetEmbedder {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ResNetEmbedder")
                .field("device", &self.device)
                .field("image_size", &self.image_size)
                .finish()
        }
    }

    impl ResNetEmbedder {
        /// Load pretrained weights from a `.ot` file
        pub fn load(weights: &Path, image_size: u32) -> Result<Self> {
            if !weights.exists() {
                return Err(MatchError::NotFound(format!(
                    "ResNet-50 weights {}",
                    weights.display()
                )));
            }

            let device = Device::cuda_if_available();
            let mut vs = nn::VarStore::new(device);
            let model = resnet::resnet50_no_final_layer(&vs.root());
            vs.load(weights)?;
            log::info!(
                "Loaded ResNet-50 weights from {} on {:?}",
                weights.display(),
                device
            );

            Ok(Self {
                _vs: vs,
                model,
                device,
                image_size,
            })
        }

        fn preprocess_image(&self, img: &DynamicImage) -> Tensor {
            let side = self.image_size as i64;
            let data = normalized_chw(img, self.image_size, self.image_size);

            // [1, 3, H, W]
            Tensor::of_slice(&data)
                .reshape(&[1, 3, side, side])
                .to_kind(Kind::Float)
        }
    }

    impl Embedder for ResNetEmbedder {
        fn name(&self) -> &str {
            "resnet50"
        }

        fn dimension(&self) -> usize {
            RESNET50_FEATURES
        }

        fn embed_image(&self, img: &DynamicImage) -> Result<Embedding> {
            let input = self.preprocess_image(img).to(self.device);
            let output = tch::no_grad(|| self.model.forward_t(&input, false));
            let output = output.to(Device::Cpu).flatten(0, -1);

            let embedding = Vec::<f32>::try_from(output)?;
            if embedding.len() != RESNET50_FEATURES {
                return Err(MatchError::DimensionMismatch {
                    expected: RESNET50_FEATURES,
                    found: embedding.len(),
                });
            }
            Ok(Array1::from(embedding))
        }
    }
}
