use anyhow::{Context, Result};
use image::Luma;
use qrcode::QrCode;
use std::io::Cursor;

/// Configuración del QR renderizado en el servidor.
pub struct QrImageConfig {
    /// Tamaño máximo del QR en píxeles.
    pub size: u32,
}

impl Default for QrImageConfig {
    fn default() -> Self {
        Self { size: 600 }
    }
}

/// Renderiza el string opaco del scan token como PNG, para clientes que no
/// pueden dibujar el QR localmente. El contenido es el token tal cual viaja
/// por el wire; no agrega ni quita información.
pub fn render_token_png(token: &str, config: &QrImageConfig) -> Result<Vec<u8>> {
    let qr = QrCode::new(token.as_bytes()).context("Error al crear QR code")?;

    let qr_image = qr
        .render::<Luma<u8>>()
        .max_dimensions(config.size, config.size)
        .build();

    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(qr_image)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .context("Error al escribir imagen PNG")?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_produces_png() {
        let png = render_token_png("scanToken:abc123", &QrImageConfig::default()).unwrap();
        // magic bytes de PNG
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
