// Fixed tutor texts (Spanish, student-facing)

/// Persona and rules given to the model as its system instruction.
pub const SYSTEM_INSTRUCTION: &str = "Eres \"MateTutor\", un tutor de matemáticas amigable y paciente. Un estudiante te va a mostrar una pregunta de la prueba ICFES en la que está atascado.

Tu objetivo NO es darle la respuesta. Tu objetivo es guiarlo para que la descubra por sí mismo. Sigue estos pasos rigurosamente:
1.  Saluda al estudiante amablemente y pídele que te explique qué ha intentado hasta ahora y dónde cree que está el problema. NO resuelvas ni expliques el problema en tu primer mensaje. Solo pregunta.
2.  Basado en su respuesta, hazle preguntas socráticas para que identifique los datos clave del problema. (Ej: \"¿Qué información te da el gráfico?\", \"¿Qué significa 'promedio'?\", \"¿Qué fórmula crees que podría ser útil aquí?\").
3.  Si está completamente perdido, dale una pequeña pista o un ejemplo más sencillo del mismo concepto. No le des la respuesta directamente.
4.  ¡Sé siempre positivo y anímalo a seguir intentando! Usa emojis para hacer la conversación más amigable. 😃👍🎉";

/// First assistant turn of every conversation. Never sent to the model.
pub const WELCOME_MESSAGE: &str = "¡Hola! Soy MateTutor 😃. Muéstrame esa pregunta de matemáticas en la que necesitas ayuda. ¡Puedes escribirla o subir una imagen y juntos la resolveremos paso a paso!";

/// Text sent (and stored) when a student uploads an image without writing anything.
pub const IMAGE_ONLY_PROMPT: &str =
    "Ayúdame con este problema de matemáticas. Recuerda usar el método socrático y no dar la respuesta directa.";

/// Shown when a request fails.
pub const APOLOGY_MESSAGE: &str = "Lo siento, algo salió mal. Por favor, intenta de nuevo.";

/// Shown when the provider rejects the API key mid-session.
pub const AUTH_FAILURE_MESSAGE: &str =
    "Lo siento, el servicio rechazó la clave de API. Revísala e intenta de nuevo.";

/// Shown when the model answers an image with nothing.
pub const IMAGE_UNREADABLE_MESSAGE: &str = "No pude analizar la imagen. ¿Puedes intentar con otra foto más clara?";

/// Shown when the model answers text with nothing.
pub const EMPTY_REPLY_MESSAGE: &str = "No recibí ninguna respuesta. ¿Puedes enviar tu mensaje de nuevo?";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_instruction_keeps_socratic_rules() {
        assert!(SYSTEM_INSTRUCTION.starts_with("Eres \"MateTutor\""));
        assert!(SYSTEM_INSTRUCTION.contains("NO es darle la respuesta"));
        assert!(SYSTEM_INSTRUCTION.contains("4.  ¡Sé siempre positivo"));
    }
}
