//! Secuencia fija de validación y despacho compartida por todos los procesadores.

use tracing::{debug, warn};

use crate::operation::{OperationKind, OperationRequest, OperationResult};

use super::MetadataHandler;

/// Ejecuta la comprobación previa y, si pasa, la operación solicitada.
///
/// Es el único punto donde los errores de las bibliotecas se convierten en resultados.
pub(crate) fn run(handler: &mut dyn MetadataHandler, request: &OperationRequest) -> OperationResult {
    let format = handler.format_name();
    let path = handler.path().display().to_string();

    if let Err(error) = handler.check_prerequisites() {
        warn!(%path, format, %error, "comprobación previa fallida");
        return error.into();
    }

    debug!(%path, format, operation = %request.kind, "despachando operación");
    let options = &request.options;
    let outcome = match request.kind {
        OperationKind::Read => handler.read(),
        OperationKind::Clean => handler.clean(),
        OperationKind::Overwrite => handler.overwrite(&options.overwrite_metadata),
        OperationKind::Export => handler.export(options.output_directory.as_deref()),
        OperationKind::Restore => handler.restore(),
    };

    match outcome {
        Ok(result) => result,
        Err(error) => {
            warn!(%path, format, operation = %request.kind, %error, "operación fallida");
            error.into()
        }
    }
}
