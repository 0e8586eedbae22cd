// Slash command handling

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    /// Attach an image to the next message
    Image(PathBuf),
    /// Drop the pending image
    DropImage,
    /// Send the pending image on its own
    Send,
    Reset,
    Debug,
    /// Replace the API key of the active provider
    Key(String),
    /// Known command used without its argument
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    /// Parse a slash command. Returns `None` for ordinary input.
    ///
    /// Spanish names are primary; English aliases are accepted.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if !input.starts_with('/') {
            return None;
        }

        let (name, arg) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "/ayuda" | "/help" => Command::Help,
            "/salir" | "/quit" | "/exit" => Command::Quit,
            "/imagen" | "/image" | "/img" => {
                if arg.is_empty() {
                    Command::Usage("/imagen <ruta-de-la-imagen>")
                } else {
                    Command::Image(PathBuf::from(unquote(arg)))
                }
            }
            "/quitar" | "/remove" | "/drop" => Command::DropImage,
            "/enviar" | "/send" => Command::Send,
            "/limpiar" | "/reset" | "/clear" => Command::Reset,
            "/debug" => Command::Debug,
            "/clave" | "/key" => {
                if arg.is_empty() {
                    Command::Usage("/clave <tu-clave-de-api>")
                } else {
                    Command::Key(arg.to_string())
                }
            }
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}

/// Strip one pair of matching quotes (paths dragged into a terminal).
fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

pub fn format_help() -> String {
    r#"Comandos disponibles:
  /imagen <ruta>  - Adjuntar una foto del problema (PNG o JPEG) al próximo mensaje
  /enviar         - Enviar la imagen adjunta sin texto
  /quitar         - Quitar la imagen adjunta
  /limpiar        - Empezar una conversación nueva
  /clave <clave>  - Configurar la clave de API del proveedor
  /debug          - Mostrar u ocultar el estado de la sesión
  /ayuda          - Mostrar esta ayuda
  /salir          - Salir

Escribe tu pregunta de matemáticas para empezar."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("¿cuánto es 2+2?"), None);
        assert_eq!(Command::parse("  x / y  "), None);
    }

    #[test]
    fn test_spanish_and_english_names() {
        assert_eq!(Command::parse("/ayuda"), Some(Command::Help));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/salir"), Some(Command::Quit));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
        assert_eq!(Command::parse("/limpiar"), Some(Command::Reset));
        assert_eq!(Command::parse("/RESET"), Some(Command::Reset));
        assert_eq!(Command::parse("/enviar"), Some(Command::Send));
        assert_eq!(Command::parse("/quitar"), Some(Command::DropImage));
        assert_eq!(Command::parse("/debug"), Some(Command::Debug));
    }

    #[test]
    fn test_image_path_argument() {
        assert_eq!(
            Command::parse("/imagen fotos/pregunta 12.png"),
            Some(Command::Image(PathBuf::from("fotos/pregunta 12.png")))
        );
        assert_eq!(
            Command::parse("/image '/tmp/p.jpg'"),
            Some(Command::Image(PathBuf::from("/tmp/p.jpg")))
        );
        assert!(matches!(Command::parse("/imagen"), Some(Command::Usage(_))));
    }

    #[test]
    fn test_key_argument() {
        assert_eq!(
            Command::parse("/clave AIza-123"),
            Some(Command::Key("AIza-123".to_string()))
        );
        assert!(matches!(Command::parse("/clave   "), Some(Command::Usage(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("/metrics"),
            Some(Command::Unknown("/metrics".to_string()))
        );
    }
}
