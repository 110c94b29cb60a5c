//! Transporte JSON delimitado por linhas.
//!
//! Uma mensagem JSON-RPC por linha, sem quebras de linha embutidas. O transporte
//! é genérico sobre leitor e escritor, então o servidor roda tanto no stdio
//! quanto em buffers em memória.

use std::io::{BufRead, BufReader, BufWriter, Stdin, Stdout, Write};

use crate::LoreResult;

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Linha lida do peer.
#[derive(Debug)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// Linha que não é uma requisição JSON-RPC.
    Malformed(String),
    Eof,
}

/// JSON-RPC sobre um stream de linhas.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// Transporte sobre o stdin/stdout do processo.
pub type StdioTransport = LineTransport<BufReader<Stdin>, BufWriter<Stdout>>;

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(
            BufReader::new(std::io::stdin()),
            BufWriter::new(std::io::stdout()),
        )
    }
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Lê a próxima mensagem, pulando linhas vazias.
    pub fn read_message(&mut self) -> LoreResult<Incoming> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(Incoming::Eof);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Ok(match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => {
                    tracing::debug!(method = %request.method, id = ?request.id, "Received request");
                    Incoming::Request(request)
                }
                Err(e) => Incoming::Malformed(e.to_string()),
            });
        }
    }

    /// Escreve uma linha de resposta e faz flush.
    pub fn write_response(&mut self, response: &JsonRpcResponse) -> LoreResult<()> {
        let body = serde_json::to_string(response)?;
        self.writer.write_all(body.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        tracing::debug!(id = ?response.id, is_error = response.is_error(), "Sent response");
        Ok(())
    }

    /// Devolve o escritor.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::JsonRpcId;
    use serde_json::json;
    use std::io::Cursor;

    fn transport(input: &str) -> LineTransport<Cursor<Vec<u8>>, Vec<u8>> {
        LineTransport::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_reads_messages_in_order() {
        let mut t = transport(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        ));

        let Incoming::Request(first) = t.read_message().unwrap() else {
            panic!("expected request");
        };
        assert_eq!(first.method, "initialize");

        let Incoming::Request(second) = t.read_message().unwrap() else {
            panic!("expected request");
        };
        assert_eq!(second.id, Some(JsonRpcId::Number(2)));

        assert!(matches!(t.read_message().unwrap(), Incoming::Eof));
    }

    #[test]
    fn test_malformed_line() {
        let mut t = transport("not valid json\n");
        assert!(matches!(t.read_message().unwrap(), Incoming::Malformed(_)));
    }

    #[test]
    fn test_notification_without_id() {
        let mut t = transport("{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n");
        let Incoming::Request(request) = t.read_message().unwrap() else {
            panic!("expected request");
        };
        assert!(request.is_notification());
    }

    #[test]
    fn test_response_is_one_line() {
        let mut t = transport("");
        t.write_response(&JsonRpcResponse::success(Some(1.into()), json!({"a": "b\nc"})))
            .unwrap();

        let output = String::from_utf8(t.into_writer()).unwrap();
        assert!(output.ends_with('\n'));
        assert_eq!(output.lines().count(), 1);

        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["result"]["a"], "b\nc");
    }
}
